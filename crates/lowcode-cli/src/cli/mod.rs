//! Command-line interface definition.
//!
//! - `lowcode build [CONTEXT]` - one-shot cjs/esm/umd build
//! - `lowcode start [CONTEXT]` - watch the project and serve the dev bundle
//!
//! Flags are folded into the override object the option resolver takes, so a
//! flag always wins over the config file.

use std::net::IpAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use serde_json::{Map, Value};

/// Build Vue component libraries for low-code page builders
#[derive(Parser, Debug)]
#[command(
    name = "lowcode",
    version,
    about = "Build Vue component libraries for low-code page builders",
    long_about = "lowcode checks, bundles and serves a Vue component library.\n\
                  `build` writes CommonJS and ES module trees, UMD bundles and the\n\
                  low-code metadata bundle; `start` serves a live development bundle."
)]
pub struct Cli {
    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Watch the project and serve the development bundle
    Start(StartArgs),

    /// Build every requested format
    Build(BuildArgs),
}

/// Options shared by `start` and `build`.
#[derive(Args, Debug, Clone, Default)]
pub struct CommonArgs {
    /// Project directory (defaults to the current directory)
    #[arg(value_name = "CONTEXT")]
    pub context: Option<PathBuf>,

    /// Config file to use instead of discovery
    #[arg(short = 'c', long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory holding component metadata files
    #[arg(short = 'm', long = "meta-path", visible_alias = "metaPath", value_name = "DIR")]
    pub meta_path: Option<PathBuf>,

    /// Global name of the UMD bundle
    #[arg(short = 'l', long, value_name = "NAME")]
    pub library: Option<String>,

    /// Extra externals: `name=Global` adds, `:name=Global` adds to the defaults
    ///
    /// Examples:
    ///   lowcode build -e lodash=_ -e :dayjs=dayjs
    #[arg(short = 'e', long, value_name = "SPEC", num_args = 1..)]
    pub externals: Vec<String>,

    /// Comma-separated output formats (cjs, esm, umd)
    #[arg(short = 'f', long, value_name = "LIST")]
    pub format: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct StartArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Port of the development server
    #[arg(short = 'p', long, default_value_t = 3333)]
    pub port: u16,

    /// Address the development server binds to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    pub host: IpAddr,
}

#[derive(Args, Debug, Clone, Default)]
pub struct BuildArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Output directory of the UMD bundles
    #[arg(short = 'o', long = "out-dir", visible_alias = "outDir", value_name = "DIR")]
    pub out_dir: Option<PathBuf>,
}

impl CommonArgs {
    /// Project directory argument, `.` when absent.
    pub fn context(&self) -> PathBuf {
        self.context.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    /// The raw override object. Only flags that were given appear in it.
    pub fn overrides(&self) -> Map<String, Value> {
        let mut map = Map::new();
        let path = |p: &PathBuf| Value::String(p.to_string_lossy().into_owned());

        if let Some(config) = &self.config {
            map.insert("config".into(), path(config));
        }
        if let Some(meta_path) = &self.meta_path {
            map.insert("metaPath".into(), path(meta_path));
        }
        if let Some(library) = &self.library {
            map.insert("library".into(), Value::String(library.clone()));
        }
        if !self.externals.is_empty() {
            map.insert(
                "externals".into(),
                Value::Array(self.externals.iter().cloned().map(Value::String).collect()),
            );
        }
        if let Some(format) = &self.format {
            map.insert("format".into(), Value::String(format.clone()));
        }
        map
    }
}

impl BuildArgs {
    pub fn overrides(&self) -> Value {
        let mut map = self.common.overrides();
        if let Some(out_dir) = &self.out_dir {
            map.insert(
                "outDir".into(),
                Value::String(out_dir.to_string_lossy().into_owned()),
            );
        }
        Value::Object(map)
    }
}

impl StartArgs {
    pub fn overrides(&self) -> Value {
        Value::Object(self.common.overrides())
    }

    pub fn origin(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).expect("valid arguments")
    }

    #[test]
    fn start_defaults() {
        let cli = parse(&["lowcode", "start"]);
        let Command::Start(args) = cli.command else {
            panic!("expected start");
        };
        assert_eq!(args.port, 3333);
        assert_eq!(args.origin(), "http://127.0.0.1:3333");
        assert_eq!(args.common.context(), PathBuf::from("."));
        assert_eq!(args.overrides(), json!({}));
    }

    #[test]
    fn build_flags_become_overrides() {
        let cli = parse(&[
            "lowcode",
            "build",
            "packages/ui",
            "-c",
            "ci.config.json",
            "-m",
            "meta",
            "-l",
            "AcmeUI",
            "-e",
            ":react=React",
            "lodash=_",
            "-f",
            "cjs,umd",
            "-o",
            "out",
        ]);
        let Command::Build(args) = cli.command else {
            panic!("expected build");
        };
        assert_eq!(args.common.context(), PathBuf::from("packages/ui"));
        assert_eq!(
            args.overrides(),
            json!({
                "config": "ci.config.json",
                "metaPath": "meta",
                "library": "AcmeUI",
                "externals": [":react=React", "lodash=_"],
                "format": "cjs,umd",
                "outDir": "out"
            })
        );
    }

    #[test]
    fn start_host_and_port() {
        let cli = parse(&["lowcode", "start", "-p", "8080", "-H", "0.0.0.0"]);
        let Command::Start(args) = cli.command else {
            panic!("expected start");
        };
        assert_eq!(args.origin(), "http://0.0.0.0:8080");
    }

    #[test]
    fn global_flags() {
        let cli = parse(&["lowcode", "build", "-v", "--no-color"]);
        assert!(cli.verbose);
        assert!(cli.no_color);
        assert!(Cli::try_parse_from(["lowcode", "build", "-v", "-q"]).is_err());
    }

    #[test]
    fn start_rejects_out_dir() {
        assert!(Cli::try_parse_from(["lowcode", "start", "-o", "out"]).is_err());
    }
}
