use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dyncert_tls::{
    CertificateConfig, CertificateStore, DynamicCertificateManager, PemMaterial, SanAccumulator,
    init_crypto,
};
use openssl::x509::X509Ref;

#[derive(Debug, Parser)]
#[command(name = "dyncert-cli")]
struct Cli {
    /// TOML configuration; created with defaults when missing.
    #[arg(long, default_value = "dyncert.toml")]
    config: PathBuf,

    #[arg(long = "log-level", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Bootstrap the CA and print its file locations.
    Ca {
        /// Replace an existing CA with a newly generated one.
        #[arg(long)]
        force: bool,
    },
    /// Issue a leaf certificate covering the given hosts. The published files
    /// are removed on exit; use `--export` to keep a copy.
    Issue {
        #[arg(long = "host")]
        hosts: Vec<String>,

        /// Copy the issued pair into this directory as stable files.
        #[arg(long)]
        export: Option<PathBuf>,

        /// Print subject, serial, validity and SAN entries.
        #[arg(long)]
        show: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_new(&cli.log_level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    init_crypto();

    let config = CertificateConfig::load_or_create(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    tracing::debug!(config = %cli.config.display(), "loaded certificate configuration");
    let sans = Arc::new(SanAccumulator::from_config(&config.subject_alternative_names));
    let manager = DynamicCertificateManager::new(config, sans)?;

    match cli.command {
        Command::Ca { force } => run_ca(&manager, force),
        Command::Issue {
            hosts,
            export,
            show,
        } => run_issue(&manager, &hosts, export.as_deref(), show),
    }
}

fn run_ca(manager: &DynamicCertificateManager, force: bool) -> anyhow::Result<()> {
    let authority = manager.authority();
    match authority.existing_paths() {
        Some((cert, key)) if !force => {
            // Loading checks that the pair parses and matches.
            authority.obtain_root_material(manager.store())?;
            println!("certificate: {}", cert.display());
            println!("private key: {}", key.display());
        }
        _ => {
            let (_, paths) = authority.build_and_save(manager.store())?;
            println!("certificate: {}", paths.cert_path.display());
            println!("public key:  {}", paths.public_key_path.display());
            println!("private key: {}", paths.key_path.display());
        }
    }
    Ok(())
}

fn run_issue(
    manager: &DynamicCertificateManager,
    hosts: &[String],
    export: Option<&Path>,
    show: bool,
) -> anyhow::Result<()> {
    for host in hosts {
        manager.add_host(host);
    }
    let handle = manager.regenerate()?;
    if !manager.is_ready() {
        anyhow::bail!("published certificate {} is not readable", handle.cert_path.display());
    }

    let certificate = manager.current_certificate()?;
    if show {
        describe(&certificate)?;
    }

    match export {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating {}", dir.display()))?;
            let key = manager.current_private_key()?;
            let store = CertificateStore::new(dir.to_string_lossy().into_owned());
            let config = manager.config();
            let cert_path = store.save(
                PemMaterial::Certificate(&certificate),
                &format!("{}.pem", config.leaf_certificate_name),
                false,
            )?;
            let key_path = store.save(
                PemMaterial::PrivateKey(&key),
                &format!("{}.pem", config.leaf_private_key_name),
                false,
            )?;
            println!("certificate: {}", cert_path.display());
            println!("private key: {}", key_path.display());
        }
        None => {
            println!("certificate: {}", handle.cert_path.display());
            println!("private key: {}", handle.key_path.display());
        }
    }
    Ok(())
}

fn describe(certificate: &X509Ref) -> anyhow::Result<()> {
    let serial = certificate.serial_number().to_bn()?.to_dec_str()?;
    println!("subject:     {:?}", certificate.subject_name());
    println!("issuer:      {:?}", certificate.issuer_name());
    println!("serial:      {serial}");
    println!("not before:  {}", certificate.not_before());
    println!("not after:   {}", certificate.not_after());
    if let Some(names) = certificate.subject_alt_names() {
        for name in names.iter() {
            if let Some(dns) = name.dnsname() {
                println!("dns:         {dns}");
            } else if let Some(ip) = name.ipaddress() {
                println!("ip:          {}", format_ip(ip));
            }
        }
    }
    Ok(())
}

fn format_ip(octets: &[u8]) -> String {
    if let Ok(bytes) = <[u8; 4]>::try_from(octets) {
        return Ipv4Addr::from(bytes).to_string();
    }
    if let Ok(bytes) = <[u8; 16]>::try_from(octets) {
        return Ipv6Addr::from(bytes).to_string();
    }
    format!("{octets:?}")
}
