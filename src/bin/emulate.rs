use clap::Parser;
use clap_num::maybe_hex;
use rv32vm::hart::eei::Eei;
use rv32vm::hart::{Hart, VmConfig};
use rv32vm::hostos::client::HostOsClient;
use rv32vm::hostos::HostConfig;
use rv32vm::loader::load_hex;
use std::io::{Read, Write};
use std::sync::mpsc;
use std::{io, thread};

/// Emulate a 32-bit RISC-V processor running a hex-encoded program
#[derive(Parser, Debug)]
#[command(author, version, about, long_about)]
struct Args {
    /// Path to the hex program file
    input: String,

    /// Load address of the program (use 0x prefix for hexadecimal)
    #[arg(short, long, value_parser=maybe_hex::<u32>, default_value_t = 0)]
    base: u32,

    /// Total guest memory in bytes
    #[arg(long, value_parser=maybe_hex::<u32>, default_value_t = 3872)]
    mem_size: u32,

    /// Initial program counter
    #[arg(long, value_parser=maybe_hex::<u32>, default_value_t = 0)]
    initial_pc: u32,

    /// Forward file and socket syscalls to a hostos daemon at this
    /// address instead of servicing them in-process
    #[arg(long)]
    host: Option<String>,

    /// Per-call deadline for daemon syscalls in milliseconds
    #[arg(long, default_value_t = 5000)]
    host_deadline_ms: u64,

    /// Single step through each instruction and print state
    #[arg(short, long)]
    debug: bool,

    /// Break on program counter match and begin debug stepping (use
    /// 0x prefix for hexadecimal)
    #[arg(short, long, value_parser=maybe_hex::<u32>)]
    pc_breakpoint: Option<u32>,

    /// Break after this many retired instructions and begin debug
    /// stepping
    #[arg(short, long)]
    step_breakpoint: Option<u64>,

    /// Stop after this many retired instructions
    #[arg(long)]
    max_steps: Option<u64>,

    /// Print the 8-word memory region starting from this address
    /// along with debugging
    #[arg(short, long, value_parser=maybe_hex::<u32>)]
    memory: Option<u32>,

    /// Print a summary line for each published frame
    #[arg(long)]
    dump_frames: bool,
}

fn press_enter_to_continue() {
    let mut stdin = io::stdin();
    let mut stdout = io::stdout();

    write!(stdout, "Press enter to continue...").unwrap();
    stdout.flush().unwrap();

    // Read a single byte and discard
    let _ = stdin.read(&mut [0u8]).unwrap();
}

fn print_memory(hart: &Hart, base: u32) {
    use rv32vm::hart::memory::Wordsize;
    for n in 0..8 {
        let addr = base + 4 * n;
        match hart.load(addr, Wordsize::Word) {
            Ok(word) => println!("{addr:x}: {word:08x}"),
            Err(_) => println!("{addr:x}: <out of range>"),
        }
    }
}

fn print_state(hart: &Hart, args: &Args) {
    println!("pc=0x{:x}, steps={}", hart.pc(), hart.steps_retired());
    if let Some(base) = args.memory {
        println!("Memory:");
        print_memory(hart, base);
    }
}

fn drain_output(hart: &mut Hart, dump_frames: bool) {
    let console = hart.flush_console();
    if !console.is_empty() {
        print!("{}", String::from_utf8_lossy(&console));
        io::stdout().flush().unwrap();
    }
    while let Some(frame) = hart.take_frame() {
        if dump_frames {
            println!("frame {}: {} bytes", frame.seq, frame.data.len());
        }
    }
}

fn make_hart(args: &Args) -> Hart {
    let config = VmConfig {
        mem_size: args.mem_size,
        initial_pc: args.initial_pc,
        ..VmConfig::default()
    };
    match &args.host {
        Some(address) => {
            let host_config = HostConfig {
                call_deadline: std::time::Duration::from_millis(args.host_deadline_ms),
                ..HostConfig::default()
            };
            let client = HostOsClient::connect(address.as_str(), &host_config)
                .expect("failed to connect to the hostos daemon");
            Hart::with_host(config, Box::new(client))
        }
        None => Hart::new(config),
    }
}

fn load_program(hart: &mut Hart, args: &Args) {
    let program = std::fs::read_to_string(&args.input).expect("failed to read the program file");
    let count = load_hex(hart, &program, args.base).expect("failed to load the program");
    println!("Loaded {count} bytes at 0x{:x}", args.base);
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    if args.debug || args.pc_breakpoint.is_some() || args.step_breakpoint.is_some() {
        let mut hart = make_hart(&args);
        load_program(&mut hart, &args);

        let mut step = args.debug;
        hart.set_trace(args.debug);
        loop {
            if let Some(pc_breakpoint) = args.pc_breakpoint {
                if hart.pc() == pc_breakpoint {
                    hart.set_trace(true);
                    step = true;
                }
            }

            if let Some(step_breakpoint) = args.step_breakpoint {
                if hart.steps_retired() == step_breakpoint {
                    hart.set_trace(true);
                    step = true;
                }
            }

            if let Err(ex) = hart.step() {
                drain_output(&mut hart, args.dump_frames);
                println!(
                    "Halted with {ex:?} at pc=0x{:x}, steps={}",
                    hart.pc(),
                    hart.steps_retired()
                );
                return;
            }

            drain_output(&mut hart, args.dump_frames);

            if let Some(max_steps) = args.max_steps {
                if hart.steps_retired() >= max_steps {
                    println!("Reached {max_steps} steps");
                    return;
                }
            }

            if step {
                print_state(&hart, &args);
                press_enter_to_continue();
            }
        }
    } else {
        let (console_tx, console_rx) = mpsc::channel();
        let dump_frames = args.dump_frames;

        // Thread running the emulation
        let emulator_handle = thread::spawn(move || {
            let mut hart = make_hart(&args);
            load_program(&mut hart, &args);

            println!("Beginning execution\n");
            loop {
                if let Err(ex) = hart.step() {
                    console_tx.send(hart.flush_console()).unwrap();
                    println!(
                        "Halted with {ex:?} at pc=0x{:x}, steps={}",
                        hart.pc(),
                        hart.steps_retired()
                    );
                    return;
                }

                console_tx.send(hart.flush_console()).unwrap();
                while let Some(frame) = hart.take_frame() {
                    if dump_frames {
                        println!("frame {}: {} bytes", frame.seq, frame.data.len());
                    }
                }

                if let Some(max_steps) = args.max_steps {
                    if hart.steps_retired() >= max_steps {
                        println!("Reached {max_steps} steps");
                        return;
                    }
                }
            }
        });

        // Thread for printing the received console stream
        let console_handle = thread::spawn(move || loop {
            if let Ok(bytes) = console_rx.recv() {
                print!("{}", String::from_utf8_lossy(&bytes));
                io::stdout().flush().unwrap();
            } else {
                break;
            }
        });

        emulator_handle.join().unwrap();
        console_handle.join().unwrap();
    }
}
