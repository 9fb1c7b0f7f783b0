// Copyright (c) 2020-present, UMD Database Group.
//
// This program is free software: you can use, redistribute, and/or modify
// it under the terms of the GNU Affero General Public License, version 3
// or later ("AGPL"), as published by the Free Software Foundation.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or
// FITNESS FOR A PARTICULAR PURPOSE.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <http://www.gnu.org/licenses/>.

//! Stratus CLI deploys and removes AWS Lambda functions with their HTTP API
//! triggers, driven by a YAML manifest.

use anyhow::Result;
use clap::{App, AppSettings, Arg, ArgMatches};
use log::info;
use stratus::manifest;
use stratus::prelude::*;
use std::path::Path;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let matches = App::new("stratus")
        .about("Deploys AWS Lambda functions and their HTTP API triggers")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .subcommand(
            App::new("deploy")
                .about("Converges the remote function and triggers to the manifest")
                .arg(manifest_arg()),
        )
        .subcommand(
            App::new("remove")
                .about("Tears the triggers and the function down")
                .arg(manifest_arg()),
        )
        .get_matches();

    match matches.subcommand() {
        Some(("deploy", sub)) => deploy(manifest_path(sub)).await,
        Some(("remove", sub)) => remove(manifest_path(sub)).await,
        _ => unreachable!(),
    }
}

fn manifest_arg() -> Arg<'static> {
    Arg::new("manifest")
        .short('m')
        .long("manifest")
        .value_name("PATH")
        .help("Path to the YAML manifest")
        .takes_value(true)
        .required(true)
}

fn manifest_path(matches: &ArgMatches) -> &str {
    matches.value_of("manifest").unwrap()
}

fn deployer_for(manifest: &Manifest) -> Result<Deployer> {
    let clients = AwsClients::new(&manifest.credentials, &manifest.region)?;
    Ok(Deployer::from_clients(&clients))
}

async fn deploy(path: &str) -> Result<()> {
    let manifest = Manifest::from_file(Path::new(path))?;
    let deployer = deployer_for(&manifest)?;
    let report = deployer.deploy(&manifest).await?;

    // A synthesized role is written back into the manifest so future runs
    // reuse it instead of generating a new one.
    if let Some(role) = &report.resolved_role {
        info!("Persisting the generated role into {}.", path);
        manifest::persist_role(Path::new(path), role)?;
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn remove(path: &str) -> Result<()> {
    let manifest = Manifest::from_file(Path::new(path))?;
    let deployer = deployer_for(&manifest)?;
    let report = deployer.remove(&manifest).await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
