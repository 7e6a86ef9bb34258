//! Thin wiring demonstration for the cTCP engine over a UDP datagram pair.
//!
//! Not part of the tested core (see `tests/`) — this only shows how a host
//! binds `Connection`'s five entrypoints to real stdin/stdout/socket I/O,
//! the way `src/bin/shell.rs` and `examples/ping.rs` wire up `Interface`.
use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::{self, Read, Write};
use std::net::UdpSocket;
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::Instant as WallInstant;

use getopts::Options;

use ctcp_rs::config::Config;
use ctcp_rs::ctcp::{Connection, ConnectionHost, TickOutcome};
use ctcp_rs::time::{Duration, Instant};

/// Pacing ticks fire at a fixed, finer grain than the retransmit timer;
/// the retransmit period itself comes from `Config::timer`.
const PACING_PERIOD: Duration = Duration::from_millis(5);
const POLL_PERIOD: std::time::Duration = std::time::Duration::from_millis(1);

struct Io {
    socket: UdpSocket,
    stdin_rx: Receiver<Vec<u8>>,
    pending_input: VecDeque<u8>,
    stdout: io::Stdout,
    bdp_log: std::fs::File,
    start: WallInstant,
}

impl ConnectionHost for Io {
    fn read_app_input(&mut self, buf: &mut [u8]) -> Option<usize> {
        while let Ok(chunk) = self.stdin_rx.try_recv() {
            self.pending_input.extend(chunk);
        }
        if self.pending_input.is_empty() {
            return Some(0);
        }
        let n = buf.len().min(self.pending_input.len());
        for slot in buf[..n].iter_mut() {
            *slot = self.pending_input.pop_front().expect("checked non-empty above");
        }
        Some(n)
    }

    fn app_output_bufspace(&self) -> usize {
        64 * 1024
    }

    fn write_app_output(&mut self, buf: &[u8]) -> bool {
        self.stdout.write_all(buf).is_ok()
    }

    fn send_datagram(&mut self, buf: &[u8]) -> Option<usize> {
        self.socket.send(buf).ok()
    }

    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    fn now_monotonic(&self) -> Instant {
        Instant::from_micros(self.start.elapsed().as_micros() as i64)
    }

    fn log_bdp(&mut self, timestamp_ms: u64, bdp_bytes: u64) {
        if let Err(err) = writeln!(self.bdp_log, "{timestamp_ms},{bdp_bytes}") {
            log::warn!("ctcpd: could not write BDP log: {err}");
        }
    }
}

/// Stdin is read on its own thread since there's no portable non-blocking
/// read for it; the main loop only ever drains what's already arrived.
fn spawn_stdin_reader() -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = [0u8; 4096];
        loop {
            match io::stdin().read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if tx.send(buf[..n].to_vec()).is_err() {
                        break;
                    }
                }
            }
        }
    });
    rx
}

fn print_usage(program: &str, opts: &Options) {
    print!("{}", opts.usage(&format!("Usage: {program} [options]")));
}

fn main() -> io::Result<()> {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    let mut opts = Options::new();
    opts.optopt("r", "recv-window", "receive window, in bytes", "BYTES");
    opts.optopt("s", "send-window", "send window, in bytes", "BYTES");
    opts.optopt("t", "timer-ms", "retransmit-tick period, in ms", "MS");
    opts.optopt("o", "rt-timeout-ms", "retransmission timeout, in ms", "MS");
    opts.optopt("b", "bind", "local UDP address to bind", "ADDR:PORT");
    opts.optopt("p", "peer", "peer UDP address to connect to", "ADDR:PORT");
    opts.optopt("l", "bdp-log", "path to the BDP log file", "PATH");
    opts.optflag("h", "help", "print this help menu");

    let matches = match opts.parse(&args[1..]) {
        Ok(matches) => matches,
        Err(err) => {
            eprintln!("{err}");
            print_usage(&args[0], &opts);
            std::process::exit(1);
        }
    };
    if matches.opt_present("h") {
        print_usage(&args[0], &opts);
        return Ok(());
    }

    let mut cfg = Config::default();
    if let Some(v) = matches.opt_str("recv-window") {
        cfg.recv_window = v.parse().expect("--recv-window must be a u16");
    }
    if let Some(v) = matches.opt_str("send-window") {
        cfg.send_window = v.parse().expect("--send-window must be a u16");
    }
    if let Some(v) = matches.opt_str("timer-ms") {
        cfg.timer = Duration::from_millis(v.parse().expect("--timer-ms must be an integer"));
    }
    if let Some(v) = matches.opt_str("rt-timeout-ms") {
        cfg.rt_timeout = Duration::from_millis(v.parse().expect("--rt-timeout-ms must be an integer"));
    }

    let bind_addr = matches.opt_str("bind").unwrap_or_else(|| "0.0.0.0:9090".to_string());
    let peer_addr = matches.opt_str("peer").unwrap_or_else(|| "127.0.0.1:9091".to_string());
    let log_path = matches.opt_str("bdp-log").unwrap_or_else(|| "bdp.log".to_string());

    let socket = UdpSocket::bind(&bind_addr)?;
    socket.connect(&peer_addr)?;
    socket.set_nonblocking(true)?;

    let bdp_log = OpenOptions::new().create(true).append(true).open(&log_path)?;

    let mut io = Io {
        socket,
        stdin_rx: spawn_stdin_reader(),
        pending_input: VecDeque::new(),
        stdout: io::stdout(),
        bdp_log,
        start: WallInstant::now(),
    };

    let mut conn = Connection::new(cfg, io.now_monotonic());
    let mut last_pacing = io.now_monotonic();
    let mut last_timer = io.now_monotonic();

    log::info!("ctcpd: bound {bind_addr}, peer {peer_addr}, logging BDP to {log_path}");

    let mut recv_buf = vec![0u8; 2048];
    loop {
        match io.socket.recv(&mut recv_buf) {
            Ok(n) => conn.on_segment_received(&mut io, &recv_buf[..n]),
            Err(ref err) if err.kind() == io::ErrorKind::WouldBlock => {}
            Err(err) => log::warn!("ctcpd: recv error: {err}"),
        }

        conn.on_input_ready(&mut io);
        conn.on_output_ready(&mut io);

        let now = io.now_monotonic();
        if now.saturating_duration_since(last_pacing) >= PACING_PERIOD {
            conn.on_pacing_tick(&mut io);
            last_pacing = now;
        }
        if now.saturating_duration_since(last_timer) >= cfg.timer {
            last_timer = now;
            if let TickOutcome::Destroyed { cause } = conn.on_retransmit_tick(&mut io) {
                log::info!("ctcpd: connection closed: {cause}");
                break;
            }
        }

        thread::sleep(POLL_PERIOD);
    }

    Ok(())
}
