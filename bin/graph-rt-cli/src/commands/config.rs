// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `graph-rt config` command: print the effective configuration.

use runtime::RuntimeConfig;

pub fn execute(config: RuntimeConfig) -> anyhow::Result<()> {
    print!("{}", config.to_toml()?);
    Ok(())
}
