use clap::Parser;
use log::info;
use rv32vm::hostos::server::HostOsServer;
use rv32vm::hostos::HostConfig;
use std::net::TcpListener;
use std::time::Duration;

/// Host services daemon: executes file and socket syscalls on behalf
/// of an emulated guest
#[derive(Parser, Debug)]
#[command(author, version, about, long_about)]
struct Args {
    /// Address to listen on for framed syscall requests
    #[arg(short, long, default_value = "127.0.0.1:9040")]
    listen: String,

    /// Per-call transport deadline in milliseconds
    #[arg(long, default_value_t = 5000)]
    deadline_ms: u64,

    /// Inbound datagrams buffered per UDP pipe
    #[arg(long, default_value_t = 32)]
    pipe_queue_capacity: usize,

    /// First fd issued to the guest (0-2 are reserved)
    #[arg(long, default_value_t = 3)]
    descriptor_start: i32,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let config = HostConfig {
        call_deadline: Duration::from_millis(args.deadline_ms),
        pipe_queue_capacity: args.pipe_queue_capacity,
        descriptor_start: args.descriptor_start,
    };

    let listener = TcpListener::bind(&args.listen).expect("failed to bind the listen address");
    info!("listening on {}", args.listen);

    let mut server = HostOsServer::new(config);
    server.serve(&listener).expect("listener failed");
}
