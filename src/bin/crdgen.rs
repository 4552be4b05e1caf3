// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! CRD YAML Generator
//!
//! Generates the `ValidatorFailover` CRD YAML from the Rust types defined in src/crd.rs,
//! so the manifest in deploy/crds/ never drifts from the code.
//!
//! Usage:
//!   cargo run --bin crdgen
//!   cargo run --bin crdgen -- --output-dir /tmp/crds

use clap::Parser;
use kube::CustomResourceExt;
use std::fs;
use std::path::{Path, PathBuf};
use validator_failover::crd::ValidatorFailover;

const COPYRIGHT_HEADER: &str = "# Copyright (c) 2025 Erick Bourgeois, firestoned
# SPDX-License-Identifier: MIT
#
# This file is AUTO-GENERATED from src/crd.rs
# DO NOT EDIT MANUALLY - Run `cargo run --bin crdgen` to regenerate
#
";

/// Render the operator's CRDs as YAML.
#[derive(Debug, Parser)]
#[command(name = "crdgen", version, about)]
struct Args {
    /// Directory the CRD files are written to
    #[arg(long, default_value = "deploy/crds")]
    output_dir: PathBuf,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    fs::create_dir_all(&args.output_dir)?;

    println!("Generating CRD YAML files from src/crd.rs...");

    generate_crd::<ValidatorFailover>("validatorfailovers.crd.yaml", &args.output_dir)?;

    println!(
        "✓ Successfully generated CRD YAML files in {}",
        args.output_dir.display()
    );
    println!("\nNext steps:");
    println!("  1. Review the generated files");
    println!(
        "  2. Deploy with: kubectl apply -f {}",
        args.output_dir.display()
    );

    Ok(())
}

fn generate_crd<T>(filename: &str, output_dir: &Path) -> Result<(), Box<dyn std::error::Error>>
where
    T: CustomResourceExt,
{
    let yaml = serde_yaml::to_string(&T::crd())?;
    let content = format!("{COPYRIGHT_HEADER}{yaml}");

    let output_path = output_dir.join(filename);
    fs::write(&output_path, content)?;

    println!("  ✓ Generated {filename}");

    Ok(())
}
