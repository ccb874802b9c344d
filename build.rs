// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Boolean switch
fn flag(id: &'static str, long: &'static str, help: &'static str) -> Arg {
    Arg::new(id).long(long).action(ArgAction::SetTrue).help(help)
}

/// Directory-valued option
fn dir_arg(id: &'static str, long: &'static str, help: &'static str) -> Arg {
    Arg::new(id).long(long).value_name("DIR").help(help)
}

fn build_cli() -> Command {
    Command::new("flint")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Flint Contributors")
        .about("Install Firefox addons and preferences from a YAML list")
        .arg(
            Arg::new("config")
                .required(true)
                .value_name("CONFIG")
                .help("YAML file listing the addons and preferences to install"),
        )
        .arg(flag("dry_run", "dry-run", "Do not install addons, just go through the motions"))
        .arg(flag(
            "dl_only",
            "dl-only",
            "Only download addons; useful for precaching an offline install",
        ))
        .arg(flag("dev", "dev", "Select the development build of addons, if available"))
        .arg(
            flag("refresh", "refresh", "Re-download addons and forget cached repository lookups")
                .short('R'),
        )
        .arg(
            dir_arg("cache_dir", "cache-dir", "Directory holding downloaded addons")
                .default_value("packages"),
        )
        .arg(dir_arg(
            "profile_dir",
            "profile-dir",
            "Install into this profile instead of the default one",
        ))
        .arg(dir_arg(
            "firefox_dir",
            "firefox-dir",
            "Firefox application data directory (holds profiles.ini)",
        ))
        .arg(flag("verbose", "verbose", "Enable debug logging").short('v'))
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("flint.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
