/*
 * ethernity: durable paper backups of arbitrary files
 * Copyright (C) 2026 Ethernity contributors
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

//! Text-mode driver for the ethernity backup/recovery pipeline. Operates on
//! raw frame files and fallback text rather than rendering QR images or
//! PDFs, both of which are external collaborators the core does not
//! implement.

use std::{
    fs,
    io::{self, Read, Write},
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use anyhow::{anyhow, bail, Context, Error};
use clap::{Arg, ArgAction, ArgMatches, Command};
use rand::rngs::OsRng;

use age::secrecy::{ExposeSecret, Secret};
use ethernity_core::{
    backup::build_backup,
    envelope::PayloadPart,
    frame::{Frame, FrameType},
    plan::{DocumentPlan, Sharding, SigningSeedMode},
    qr::{CharCountFit, QrConfig},
    recover::{recover, AuthStatus},
};

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn read_all(path: &str) -> Result<Vec<u8>, Error> {
    let mut buf = Vec::new();
    if path == "-" {
        io::stdin().read_to_end(&mut buf)?;
    } else {
        fs::File::open(path)
            .with_context(|| format!("failed to open '{path}'"))?
            .read_to_end(&mut buf)?;
    }
    Ok(buf)
}

fn backup_cli() -> Command {
    Command::new("backup")
        .about("Create a new ethernity backup from one or more input files.")
        .arg(
            Arg::new("sealed")
                .long("sealed")
                .help("Create a sealed backup: the signing seed is not stored, so no new shards can be minted later.")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("passphrase")
                .long("passphrase")
                .value_name("PASSPHRASE")
                .help("Passphrase to encrypt with. If omitted, a BIP-39 mnemonic is generated.")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("words")
                .long("words")
                .value_name("N")
                .help("Mnemonic word count when auto-generating a passphrase (one of 12, 15, 18, 21, 24).")
                .action(ArgAction::Set)
                .default_value("24"),
        )
        .arg(
            Arg::new("threshold")
                .long("threshold")
                .value_name("T")
                .help("Passphrase shard threshold. Requires --shares.")
                .action(ArgAction::Set)
                .requires("shares"),
        )
        .arg(
            Arg::new("shares")
                .long("shares")
                .value_name("N")
                .help("Number of passphrase shards to create. Requires --threshold.")
                .action(ArgAction::Set)
                .requires("threshold"),
        )
        .arg(
            Arg::new("shard-signing-seed")
                .long("shard-signing-seed")
                .help("Also split the signing seed into shard documents (requires --threshold/--shares and an unsealed backup).")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("qr-chunk-size")
                .long("qr-chunk-size")
                .value_name("BYTES")
                .help("Preferred MAIN frame chunk size before the QR capacity probe shrinks it.")
                .action(ArgAction::Set)
                .default_value("1024"),
        )
        .arg(
            Arg::new("out-dir")
                .short('o')
                .long("out-dir")
                .value_name("DIR")
                .help("Directory to write frame and fallback files into.")
                .action(ArgAction::Set)
                .required(true),
        )
        .arg(
            Arg::new("INPUT")
                .help("Input files to back up.")
                .action(ArgAction::Append)
                .required(true),
        )
}

fn parse_sharding(matches: &ArgMatches) -> Result<Option<Sharding>, Error> {
    let threshold = matches.get_one::<String>("threshold");
    let shares = matches.get_one::<String>("shares");
    match (threshold, shares) {
        (Some(t), Some(n)) => {
            let t: u8 = t.parse().context("--threshold must be an integer 1..=255")?;
            let n: u8 = n.parse().context("--shares must be an integer 1..=255")?;
            Ok(Some(Sharding::new(t, n)?))
        }
        _ => Ok(None),
    }
}

fn run_backup(matches: &ArgMatches) -> Result<(), Error> {
    let sealed = matches.get_flag("sealed");
    let words: u32 = matches
        .get_one::<String>("words")
        .expect("has default")
        .parse()
        .context("--words must be an integer")?;
    let qr_chunk_size: usize = matches
        .get_one::<String>("qr-chunk-size")
        .expect("has default")
        .parse()
        .context("--qr-chunk-size must be an integer")?;
    let out_dir = PathBuf::from(matches.get_one::<String>("out-dir").expect("required"));
    fs::create_dir_all(&out_dir).with_context(|| format!("creating {}", out_dir.display()))?;

    let sharding = parse_sharding(matches)?;
    let shard_signing_seed = matches.get_flag("shard-signing-seed");
    let signing_seed_mode = if shard_signing_seed {
        SigningSeedMode::Sharded
    } else {
        SigningSeedMode::Embedded
    };
    let plan = DocumentPlan {
        sealed,
        sharding,
        signing_seed_mode,
        signing_seed_sharding: if shard_signing_seed { sharding } else { None },
    };

    let inputs: Vec<&String> = matches
        .get_many::<String>("INPUT")
        .context("at least one input file is required")?
        .collect();
    let mut parts = Vec::with_capacity(inputs.len());
    for input in &inputs {
        let path = Path::new(input);
        let data = fs::read(path).with_context(|| format!("reading {input}"))?;
        let relative = path
            .file_name()
            .ok_or_else(|| anyhow!("input path '{input}' has no file name"))?
            .to_string_lossy()
            .into_owned();
        let mtime = fs::metadata(path)
            .ok()
            .and_then(|m| m.modified().ok())
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs());
        parts.push(PayloadPart {
            path: relative,
            data,
            mtime,
        });
    }

    let passphrase = matches
        .get_one::<String>("passphrase")
        .map(|p| Secret::new(p.clone()));

    let output = build_backup(
        &parts,
        &plan,
        passphrase,
        words,
        now_unix(),
        qr_chunk_size,
        &CharCountFit,
        &QrConfig::default(),
        &mut OsRng,
    )?;

    let doc_id_hex = hex_encode(&output.doc_id);
    for (i, frame) in output.main_frames.iter().enumerate() {
        write_frame(&out_dir, &format!("main-{doc_id_hex}-{i:04}.frame"), frame)?;
    }
    write_frame(&out_dir, &format!("auth-{doc_id_hex}.frame"), &output.auth_frame)?;
    for (i, frame) in output.key_frames.iter().enumerate() {
        write_frame(&out_dir, &format!("key-{doc_id_hex}-{i:04}.frame"), frame)?;
    }

    let recovery_lines = ethernity_core::fallback::recovery_document_lines(&output.auth_frame, &output.main_fallback_frame)?;
    fs::write(
        out_dir.join(format!("recovery-{doc_id_hex}.txt")),
        recovery_lines.join("\n") + "\n",
    )?;

    println!("Document ID: {doc_id_hex}");
    if matches.get_one::<String>("passphrase").is_none() {
        println!("Generated passphrase: {}", output.passphrase.expose_secret());
    }
    if !output.passphrase_shards.is_empty() {
        println!(
            "Passphrase split into {} shard(s), {} required to recover.",
            output.passphrase_shards.len(),
            output.passphrase_shards[0].threshold
        );
    }
    println!("Wrote {} file(s) to {}", out_dir.display(), out_dir.display());
    Ok(())
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn write_frame(dir: &Path, name: &str, frame: &Frame) -> Result<(), Error> {
    fs::write(dir.join(name), frame.encode()?).with_context(|| format!("writing {name}"))?;
    Ok(())
}

fn recover_cli() -> Command {
    Command::new("recover")
        .about("Recover the original files from ethernity frame files and/or fallback text.")
        .arg(
            Arg::new("frame")
                .long("frame")
                .value_name("PATH")
                .help(r#"Path to a raw frame file ("-" to read from stdin)."#)
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("fallback")
                .long("fallback")
                .value_name("PATH")
                .help(r#"Path to a fallback recovery text file ("-" to read from stdin)."#)
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("passphrase")
                .long("passphrase")
                .value_name("PASSPHRASE")
                .help("Passphrase to decrypt with, if not recovering from shard documents.")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("allow-unsigned")
                .long("allow-unsigned")
                .help("Proceed even if no AUTH frame is available to verify the backup's signature.")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("out-dir")
                .short('o')
                .long("out-dir")
                .value_name("DIR")
                .help("Directory to write recovered files into.")
                .action(ArgAction::Set)
                .required(true),
        )
}

fn run_recover(matches: &ArgMatches) -> Result<(), Error> {
    let mut frames = Vec::new();

    if let Some(paths) = matches.get_many::<String>("frame") {
        for path in paths {
            let bytes = read_all(path)?;
            frames.push(Frame::decode(&bytes).with_context(|| format!("decoding frame '{path}'"))?);
        }
    }
    if let Some(paths) = matches.get_many::<String>("fallback") {
        for path in paths {
            let bytes = read_all(path)?;
            let text = String::from_utf8(bytes).with_context(|| format!("fallback file '{path}' is not UTF-8"))?;
            let (auth, main) = ethernity_core::fallback::parse_recovery_text(&text)
                .with_context(|| format!("parsing fallback text '{path}'"))?;
            frames.extend(auth);
            frames.extend(main);
        }
    }
    if frames.is_empty() {
        bail!("no frames provided; use --frame and/or --fallback");
    }

    let allow_unsigned = matches.get_flag("allow-unsigned");
    let passphrase = matches.get_one::<String>("passphrase").map(|p| Secret::new(p.clone()));

    let output = recover(&frames, passphrase.as_ref(), allow_unsigned)?;
    if output.auth_status == AuthStatus::Skipped {
        log::warn!("recovered {} without verifying an AUTH signature (--allow-unsigned)", hex_encode(&output.doc_id));
    }

    let out_dir = PathBuf::from(matches.get_one::<String>("out-dir").expect("required"));
    fs::create_dir_all(&out_dir).with_context(|| format!("creating {}", out_dir.display()))?;
    for file in &output.files {
        let dest = out_dir.join(&file.path);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::File::create(&dest)
            .with_context(|| format!("creating {}", dest.display()))?
            .write_all(&file.data)?;
    }

    println!("Document ID: {}", hex_encode(&output.doc_id));
    println!("Auth status: {:?}", output.auth_status);
    println!("Recovered {} file(s) into {}", output.files.len(), out_dir.display());
    Ok(())
}

fn main() -> Result<(), Error> {
    env_logger::init();

    let app = Command::new("ethernity")
        .version("0.0.0")
        .author("Ethernity contributors")
        .about("Create and recover durable paper backups of arbitrary files.")
        .subcommand(backup_cli())
        .subcommand(recover_cli());

    let matches = app.get_matches();
    match matches.subcommand() {
        Some(("backup", sub_matches)) => run_backup(sub_matches),
        Some(("recover", sub_matches)) => run_recover(sub_matches),
        _ => Err(anyhow!("no subcommand specified; run with --help")),
    }
}
