use bitlite::benc;
use bitlite::info_stopwatch;
use bitlite::meta::{Metainfo, creator};
use bitlite::pwp::{self, MessageId};
use bitlite::tracker::{self, AnnounceEvent, AnnounceRequest};
use bitlite::utils::config::{self, Config};
use bitlite::utils::discovery::{PeerLocator, StaticLocator};
use bitlite::utils::hex::hex;
use bitlite::utils::peer_id::PeerId;
use clap::{Parser, Subcommand};
use std::fs;
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Settings file
    #[arg(long, value_name = "PATH", default_value = config::FILENAME)]
    config: PathBuf,

    /// Enable debug logs
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a single-file .torrent
    Create {
        /// File to share
        input: PathBuf,
        /// Tracker announce URL
        #[arg(short, long, default_value = "")]
        announce: String,
        /// Piece length in bytes (overrides the settings file)
        #[arg(short, long)]
        piece_length: Option<usize>,
        /// Output path, defaults to <input>.torrent
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Show the content of a .torrent
    Info {
        /// Path to a .torrent file
        metainfo: PathBuf,
        /// Print the raw bencode tree
        #[arg(long)]
        raw: bool,
    },
    /// Announce to the tracker of a .torrent
    Announce {
        /// Path to a .torrent file
        metainfo: PathBuf,
        /// Announce event (started, stopped or completed)
        #[arg(short, long)]
        event: Option<AnnounceEvent>,
    },
    /// Handshake with a peer and wait to be unchoked
    Connect {
        /// Path to a .torrent file
        metainfo: PathBuf,
        /// Peer address
        #[arg(long, value_name = "IP:PORT")]
        peer: SocketAddr,
    },
}

fn main() -> io::Result<()> {
    let cli = Cli::parse();

    simple_logger::SimpleLogger::new()
        .with_threads(false)
        .with_level(log::LevelFilter::Off)
        .with_module_level(
            "bitlite",
            if cli.verbose { log::LevelFilter::Debug } else { log::LevelFilter::Info },
        )
        .init()
        .map_err(io::Error::other)?;

    let config = config::load_config(&cli.config)?;

    match cli.command {
        Command::Create {
            input,
            announce,
            piece_length,
            output,
        } => create(&input, announce, piece_length.unwrap_or(config.piece_length), output),
        Command::Info { metainfo, raw } => info(&metainfo, raw),
        Command::Announce { metainfo, event } => {
            let event = match event {
                Some(event) => event,
                None => config
                    .event
                    .parse()
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?,
            };
            announce(&metainfo, event, &config)
        }
        Command::Connect { metainfo, peer } => connect(&metainfo, StaticLocator::from(peer), &config),
    }
}

fn create(
    input: &Path,
    announce: String,
    piece_length: usize,
    output: Option<PathBuf>,
) -> io::Result<()> {
    let _sw = info_stopwatch!("Creating torrent from {}", input.display());
    let output = output.unwrap_or_else(|| {
        let mut name = input.as_os_str().to_owned();
        name.push(".torrent");
        PathBuf::from(name)
    });
    let file = creator::TorrentFile::from_file(input, announce, piece_length)?;
    creator::write_torrent_file(&output, &file)?;
    println!("{}", Metainfo::from_file(&output)?);
    Ok(())
}

fn info(metainfo: &Path, raw: bool) -> io::Result<()> {
    if raw {
        let content = fs::read(metainfo)?;
        println!("{}", benc::Element::from_bytes(&content)?);
    } else {
        println!("{}", Metainfo::from_file(metainfo)?);
    }
    Ok(())
}

fn announce(metainfo: &Path, event: AnnounceEvent, config: &Config) -> io::Result<()> {
    let metainfo = Metainfo::from_file(metainfo)?;
    let request = AnnounceRequest {
        info_hash: *metainfo.info_hash(),
        peer_id: *PeerId::generate_new(),
        port: config.listen_port,
        uploaded: 0,
        downloaded: 0,
        left: metainfo.length(),
        event,
    };
    let response = tracker::announce(&metainfo.announce(), &request)?;
    print!("{response}");
    Ok(())
}

fn connect(metainfo: &Path, locator: impl PeerLocator, config: &Config) -> io::Result<()> {
    let metainfo = Metainfo::from_file(metainfo)?;
    let (ip, port) = locator.locate(&config.interface)?;
    let local_peer_id = PeerId::generate_new();

    let mut stream = pwp::connect_to_peer(&ip, port)?;
    pwp::send_handshake(&mut stream, metainfo.info_hash(), &local_peer_id)?;
    let remote = pwp::read_handshake(&mut stream).ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidData, "peer sent an invalid handshake")
    })?;
    if &remote.info_hash != metainfo.info_hash() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("peer serves a different torrent ({})", hex(&remote.info_hash)),
        ));
    }

    if !pwp::send_interested(&mut stream) {
        return Err(io::Error::new(io::ErrorKind::BrokenPipe, "failed to send interested"));
    }

    let backlog = pwp::wait_for_unchoke_with_backlog(&mut stream, &config.unchoke_policy())
        .ok_or_else(|| io::Error::new(io::ErrorKind::TimedOut, "peer did not unchoke us"))?;

    let bitfield = backlog
        .iter()
        .find(|msg| msg.id() == MessageId::Bitfield)
        .map(|msg| pwp::bitfield_from_payload(msg.payload(), metainfo.piece_count()))
        .unwrap_or_default();
    println!(
        "Unchoked by {} ({ip}:{port}), peer has {} of {} pieces",
        String::from_utf8_lossy(&remote.peer_id),
        bitfield.count_ones(),
        metainfo.piece_count()
    );
    Ok(())
}
