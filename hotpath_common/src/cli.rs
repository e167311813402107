// This product includes software developed at Datadog (https://www.datadoghq.com/) Copyright 2024 Datadog, Inc.

use serde::{Deserialize, Serialize};

// Hotpath commands
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum HotpathCommand {
    Check,
    PrintRestricted,
    GenerateConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct HotpathArgs {
    pub command: HotpathCommand,
    pub graph_path: Option<String>,
    pub config_path: Option<String>,
    /// Extra allowlist signatures given on the command line
    pub allow: Vec<String>,
    /// Anything we didn't recognise. Reported, never fatal.
    pub unrecognized: Vec<String>,
}

impl Default for HotpathArgs {
    fn default() -> Self {
        Self {
            command: HotpathCommand::Check,
            graph_path: None,
            config_path: None,
            allow: Vec::new(),
            unrecognized: Vec::new(),
        }
    }
}

impl HotpathArgs {
    pub fn to_env_str(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn parse<I>(args: I) -> Self
    where
        I: Iterator<Item = String>,
    {
        let mut parsed = HotpathArgs::default();

        let args: Vec<String> = args.collect();

        // Skip the program name, and 'hotpath' too if we were run as `cargo hotpath`
        let mut start_idx = 1;
        if args.get(1).map(String::as_str) == Some("hotpath") {
            start_idx = 2;
        }

        if let Some(first) = args.get(start_idx) {
            match first.as_str() {
                "check" => {
                    parsed.command = HotpathCommand::Check;
                    start_idx += 1;
                }
                "print-restricted" => {
                    parsed.command = HotpathCommand::PrintRestricted;
                    start_idx += 1;
                }
                "generate-config" => {
                    parsed.command = HotpathCommand::GenerateConfig;
                    start_idx += 1;
                }
                _ => { /* Not a command, use default and keep this arg */ }
            }
        }

        let mut i = start_idx;
        while i < args.len() {
            let flag = args[i].as_str();
            let target = match flag {
                "--graph" => Some(&mut parsed.graph_path),
                "--config" => Some(&mut parsed.config_path),
                _ => None,
            };

            if let Some(slot) = target {
                match args.get(i + 1) {
                    Some(value) => {
                        *slot = Some(value.clone());
                        i += 2;
                    }
                    None => {
                        eprintln!("Warning: {flag} flag requires a path argument");
                        i += 1;
                    }
                }
                continue;
            }

            if flag == "--allow" {
                match args.get(i + 1) {
                    Some(value) => {
                        parsed.allow.push(value.clone());
                        i += 2;
                    }
                    None => {
                        eprintln!("Warning: --allow flag requires a member signature");
                        i += 1;
                    }
                }
                continue;
            }

            parsed.unrecognized.push(args[i].clone());
            i += 1;
        }

        parsed
    }
}
