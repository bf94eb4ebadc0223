//! Build automation tasks for MGI Dump
//!
//! - `generate-cli-docs`: regenerate the CLI reference from the clap
//!   definitions

use clap::Parser;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build automation tasks for MGI Dump", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Generate the CLI reference in markdown
    GenerateCliDocs {
        /// Output directory for generated documentation
        #[arg(short, long, default_value = "docs")]
        output_dir: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::GenerateCliDocs { output_dir } => generate_cli_docs(&output_dir)?,
    }

    Ok(())
}

fn generate_cli_docs(output_dir: &str) -> anyhow::Result<()> {
    println!("Generating CLI documentation...");

    let markdown = clap_markdown::help_markdown::<mgi_dump::Cli>();

    let content = format!(
        r#"# MGI Dump CLI Reference

Generated from the CLI source code on {}.

## Overview

`mgi-dump` reconciles the ontology files that feed the MGI export and audits
the item files the export writes.

## Quick Start

```bash
# Rebuild the OMIM terms of the MeSH disease file from the mapping table
mgi-dump remosh CTD_diseases.obo mesh_omim.tsv --names omim_terms.tsv \
  --output MeshOmim.obo --report remosh.json

# Conflate the MEDIC vocabulary with OMIM names
mgi-dump medic CTD_diseases.obo --names omim_terms.tsv --output MEDIC.obo

# Keep only live DO terms
mgi-dump filter-do doid.obo --output DO.obo

# Merge EMAP and MA and place the GXD structures
mgi-dump anatomy --emap EMAP.obo --ma adult_mouse_anatomy.obo \
  --gxd gxd_structures.tsv --output EMAP_combined.obo

# Check written item files for duplicate and dangling ids
mgi-dump check-ids output/
```

## Commands

{}

## Environment Variables

- `MGI_DUMP_INTERNAL_PREFIX` - prefix of the target vocabulary (default: `MESH`)
- `MGI_DUMP_EXTERNAL_PREFIX` - prefix of the external vocabulary (default: `OMIM`)
- `MGI_DUMP_CHECK_REFS` - strict id checking (default: `true`)
- `MGI_DUMP_KEY_SCHEME` - `sequenced` or `natural` (default: `sequenced`)
- `MGI_DUMP_SEQUENCE_START` - first synthetic sequence number (default: `1001`)
- `MGI_DUMP_OUTPUT_DIR` - item output directory (default: `.`)
- `LOG_LEVEL`, `LOG_OUTPUT`, `LOG_FORMAT`, `LOG_DIR`, `LOG_FILE_PREFIX`, `LOG_FILTER` - logging

A `.env` file in the working directory is read before the environment.

---

*Regenerate with `cargo xtask generate-cli-docs`.*
"#,
        chrono::Utc::now().format("%Y-%m-%d"),
        markdown
    );

    let output_path = PathBuf::from(output_dir);
    fs::create_dir_all(&output_path)?;

    let file_path = output_path.join("cli-reference.md");
    fs::write(&file_path, content)?;

    println!("Generated CLI documentation at: {}", file_path.display());

    Ok(())
}
