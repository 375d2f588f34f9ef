// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Server configuration from the command line and environment.

use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

/// Ledger Service - Exactly-once transaction ledger over HTTP
///
/// Every flag can also be set through the environment variable shown.
#[derive(Parser, Debug, Clone)]
#[command(name = "ledger-service")]
#[command(about = "Serves a user ledger with duplicate-safe transaction ingestion", long_about = None)]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "LEDGER_BIND", default_value = "127.0.0.1:3000")]
    pub bind: SocketAddr,

    /// Per-request deadline in milliseconds (0 disables it)
    #[arg(long, env = "LEDGER_REQUEST_TIMEOUT_MS", default_value_t = 5000)]
    pub request_timeout_ms: u64,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, env = "LEDGER_LOG", default_value = "info")]
    pub log_level: String,
}

impl Config {
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::try_parse_from(["ledger-service"]).unwrap();
        assert_eq!(config.bind, "127.0.0.1:3000".parse().unwrap());
        assert_eq!(config.request_timeout(), Some(Duration::from_millis(5000)));
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn zero_timeout_disables_deadline() {
        let config =
            Config::try_parse_from(["ledger-service", "--request-timeout-ms", "0"]).unwrap();
        assert_eq!(config.request_timeout(), None);
    }

    #[test]
    fn rejects_bad_bind_address() {
        assert!(Config::try_parse_from(["ledger-service", "--bind", "nowhere"]).is_err());
    }
}
