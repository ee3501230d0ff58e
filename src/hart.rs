//! RV32IM user-mode hart
//!
//! A single hart executing unprivileged instructions against a flat
//! memory, a 32-entry register file and a program counter. One call
//! to [`Hart::step`] retires exactly one instruction: fetch the word
//! at pc, look it up in the decoder, run its executer. A step that
//! fails leaves registers, memory and pc exactly as they were and
//! returns the reason, so whoever drives the loop decides what halts
//! mean.
//!
//! The hart also owns the guest-visible output channels: a console
//! byte stream fed by the print service and a frame queue fed by the
//! draw service, both drained by the embedder. Host file and socket
//! services go through a [`HostOs`] handle, in-process by default.

use queues::{IsQueue, Queue};

use crate::{
    arch::{make_rv32i, make_rv32m, make_rv32sys},
    decode::Decoder,
    hostos::{server::HostOsServer, HostOs, HostRequest, HostResponse},
    loader::{LoadError, ProgramLoadable},
    rv32i::Instr,
    utils::mask,
};

use self::{
    eei::Eei,
    exception::Exception,
    memory::{Memory, Wordsize},
    registers::Registers,
};

pub mod eei;
pub mod exception;
pub mod memory;
pub mod registers;

#[derive(Debug, Clone)]
pub struct VmConfig {
    /// Total backing memory in bytes
    pub mem_size: u32,
    /// Program counter value at reset
    pub initial_pc: u32,
    /// Start of the region published by the draw service
    pub vram_base: u32,
    /// Length of the region published by the draw service
    pub vram_len: u32,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            mem_size: 3872,
            initial_pc: 0,
            vram_base: 3072,
            vram_len: 800,
        }
    }
}

/// One published copy of the video memory region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Monotonic publication number
    pub seq: u64,
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(seq: u64, data: Vec<u8>) -> Self {
        Self { seq, data }
    }
}

pub struct Hart {
    pub(crate) config: VmConfig,
    pub(crate) registers: Registers,
    pub(crate) memory: Memory,
    pc: u32,
    decoder: Decoder<Instr<Hart>>,
    console: Queue<u8>,
    frames: Queue<Frame>,
    pub(crate) next_frame_seq: u64,
    host: Box<dyn HostOs>,
    steps_retired: u64,
    trace: bool,
}

impl Hart {
    /// Make a hart with an in-process host, so file and socket
    /// services work without a daemon.
    pub fn new(config: VmConfig) -> Self {
        Self::with_host(config, Box::<HostOsServer>::default())
    }

    pub fn with_host(config: VmConfig, host: Box<dyn HostOs>) -> Self {
        let mut decoder = Decoder::new(mask(7));
        make_rv32i(&mut decoder).expect("rv32i registration is statically unambiguous");
        make_rv32m(&mut decoder).expect("rv32m registration is statically unambiguous");
        make_rv32sys(&mut decoder).expect("system registration is statically unambiguous");

        Self {
            pc: config.initial_pc,
            memory: Memory::new(config.mem_size),
            config,
            registers: Registers::new(),
            decoder,
            console: Queue::new(),
            frames: Queue::new(),
            next_frame_seq: 0,
            host,
            steps_retired: 0,
            trace: false,
        }
    }

    pub fn set_trace(&mut self, trace: bool) {
        self.trace = trace;
    }

    /// Number of instructions retired so far
    pub fn steps_retired(&self) -> u64 {
        self.steps_retired
    }

    /// Return the assembly string for an instruction word, if it
    /// decodes to something this hart implements.
    pub fn disassemble(&self, instr: u32) -> Option<String> {
        self.decoder
            .get_exec(instr)
            .ok()
            .map(|decoded| (decoded.printer)(instr))
    }

    /// Return the current contents of the console stream and also
    /// empty it
    pub fn flush_console(&mut self) -> Vec<u8> {
        let mut bytes = Vec::new();
        while let Ok(byte) = self.console.remove() {
            bytes.push(byte);
        }
        bytes
    }

    /// Take the oldest published frame, if any
    pub fn take_frame(&mut self) -> Option<Frame> {
        self.frames.remove().ok()
    }

    pub(crate) fn push_console(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.console
                .add(*byte)
                .expect("the console queue is unbounded");
        }
    }

    pub(crate) fn push_frame(&mut self, frame: Frame) {
        self.frames
            .add(frame)
            .expect("the frame queue is unbounded");
    }

    pub(crate) fn host_call(&mut self, request: &HostRequest) -> HostResponse {
        self.host.call(request)
    }

    /// Execute the instruction at pc and advance the machine state.
    /// On an error the state (pc included) is untouched.
    pub fn step(&mut self) -> Result<(), Exception> {
        let instr = self.fetch_instruction()?;

        let decoded = self
            .decoder
            .get_exec(instr)
            .map_err(|_| Exception::IllegalInstruction)?;

        if self.trace {
            log::trace!(
                "step {}: pc=0x{:08x} instr=0x{instr:08x} {}",
                self.steps_retired,
                self.pc,
                (decoded.printer)(instr)
            );
        }

        // The borrow of the decoder ends here; executers look the
        // instruction up again if they need its fields
        let executer = decoded.executer;
        executer(self, instr)?;

        self.steps_retired += 1;
        if self.trace {
            log::trace!("{}", self.registers);
        }
        Ok(())
    }

    fn fetch_instruction(&self) -> Result<u32, Exception> {
        if self.pc % 4 != 0 {
            return Err(Exception::FetchFault);
        }
        self.memory
            .read(self.pc, Wordsize::Word)
            .map_err(|_| Exception::FetchFault)
    }
}

impl Eei for Hart {
    fn pc(&self) -> u32 {
        self.pc
    }

    fn set_pc(&mut self, pc: u32) {
        self.pc = pc;
    }

    fn x(&self, x: u8) -> u32 {
        self.registers.read(x)
    }

    fn set_x(&mut self, x: u8, value: u32) {
        self.registers.write(x, value);
    }

    fn increment_pc(&mut self) {
        self.pc = self.pc.wrapping_add(4);
    }

    fn load(&self, addr: u32, width: Wordsize) -> Result<u32, Exception> {
        self.memory
            .read(addr, width)
            .map_err(|_| Exception::LoadFault)
    }

    fn store(&mut self, addr: u32, data: u32, width: Wordsize) -> Result<(), Exception> {
        self.memory
            .write(addr, data, width)
            .map_err(|_| Exception::StoreFault)
    }

    fn ecall(&mut self) -> Result<(), Exception> {
        self.dispatch_ecall()
    }
}

impl ProgramLoadable for Hart {
    fn write_byte(&mut self, addr: u32, data: u8) -> Result<(), LoadError> {
        self.memory
            .write(addr, data.into(), Wordsize::Byte)
            .map_err(|_| LoadError::DoesNotFit { addr })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecall::{REG_A0, REG_A1, REG_A2, REG_A7};
    use crate::encode::*;
    use crate::hostos::{HostConfig, HostOs, STATUS_EAGAIN};
    use crate::utils::interpret_i32_as_unsigned;

    /// Simple wrapper to load 4 consecutive bytes
    fn write_instr(hart: &mut Hart, mut addr: u32, instr: u32) {
        for byte in instr.to_le_bytes().iter() {
            hart.memory
                .write(addr, (*byte).into(), Wordsize::Byte)
                .expect("writing instruction should work; fix address if not");
            addr += 1;
        }
    }

    fn hart() -> Hart {
        Hart::new(VmConfig::default())
    }

    #[test]
    fn check_state_on_reset() {
        let hart = hart();
        assert_eq!(hart.pc(), 0);
        assert_eq!(hart.steps_retired(), 0);
        for n in 0..32 {
            assert_eq!(hart.x(n), 0);
        }
    }

    #[test]
    fn check_initial_pc_is_configurable() {
        let config = VmConfig {
            initial_pc: 0x80,
            ..VmConfig::default()
        };
        let hart = Hart::new(config);
        assert_eq!(hart.pc(), 0x80);
    }

    #[test]
    fn check_illegal_instruction() {
        let mut hart = hart();
        write_instr(&mut hart, 0, 0);
        assert_eq!(hart.step(), Err(Exception::IllegalInstruction));
        assert_eq!(hart.pc(), 0);
        assert_eq!(hart.steps_retired(), 0);
    }

    #[test]
    fn check_misaligned_fetch_faults() {
        let mut hart = hart();
        hart.set_pc(2);
        assert_eq!(hart.step(), Err(Exception::FetchFault));
        assert_eq!(hart.pc(), 2);
    }

    #[test]
    fn check_out_of_range_fetch_faults() {
        let mut hart = hart();
        hart.set_pc(VmConfig::default().mem_size);
        assert_eq!(hart.step(), Err(Exception::FetchFault));
    }

    #[test]
    fn check_x0_never_written() {
        let mut hart = hart();
        write_instr(&mut hart, 0, addi!(x0, x1, 100));
        hart.set_x(1, 1);
        hart.step().unwrap();
        assert_eq!(hart.x(0), 0);
        assert_eq!(hart.pc(), 4);
    }

    #[test]
    fn check_add() {
        let mut hart = hart();
        // add t2, t0, t1 (0x006283b3)
        write_instr(&mut hart, 0, 0x0062_83b3);
        hart.set_x(5, 64);
        hart.set_x(6, 128);
        hart.step().unwrap();
        assert_eq!(hart.x(7), 192);
        assert_eq!(hart.pc(), 4);
    }

    #[test]
    fn check_sub_wrapping() {
        let mut hart = hart();
        // sub t2, t0, t1 (0x406283b3)
        write_instr(&mut hart, 0, 0x4062_83b3);
        hart.set_x(5, 64);
        hart.set_x(6, 0xffff_ff80);
        hart.step().unwrap();
        assert_eq!(hart.x(7), 0xc0);
        assert_eq!(hart.pc(), 4);
    }

    #[test]
    fn check_jal() {
        let mut hart = hart();
        // jal t0, 0x100 (0x100002ef)
        write_instr(&mut hart, 0, 0x1000_02ef);
        hart.step().unwrap();
        assert_eq!(hart.x(5), 4);
        assert_eq!(hart.pc(), 0x100);
    }

    #[test]
    fn check_jalr_clears_low_bit() {
        let mut hart = hart();
        write_instr(&mut hart, 12, jalr!(x4, x6, -3));
        hart.set_pc(12);
        hart.set_x(6, 20);
        hart.step().unwrap();
        assert_eq!(hart.x(4), 16);
        assert_eq!(hart.pc(), 16);
    }

    #[test]
    fn check_beq_taken() {
        let mut hart = hart();
        // beq t0, t1, 0x20 (0x02628063)
        write_instr(&mut hart, 0, 0x0262_8063);
        hart.set_x(5, 2);
        hart.set_x(6, 2);
        hart.step().unwrap();
        assert_eq!(hart.pc(), 0x20);
    }

    #[test]
    fn check_beq_not_taken() {
        let mut hart = hart();
        write_instr(&mut hart, 0, beq!(x5, x6, 0x20));
        hart.set_x(5, 1);
        hart.set_x(6, 2);
        hart.step().unwrap();
        assert_eq!(hart.pc(), 4);
    }

    #[test]
    fn check_blt_signed() {
        let mut hart = hart();
        // blt t0, t1, 0x20 (0x0262c063)
        write_instr(&mut hart, 0, 0x0262_c063);
        hart.set_x(5, 0xffff_ff9c); // -100
        hart.set_x(6, 10);
        hart.step().unwrap();
        assert_eq!(hart.pc(), 0x20);
    }

    #[test]
    fn check_branch_to_misaligned_target_faults_at_next_fetch() {
        let mut hart = hart();
        write_instr(&mut hart, 0, beq!(x1, x2, 15));
        hart.set_x(1, 2);
        hart.set_x(2, 2);
        // The branch itself retires; the fetch from pc=14 faults
        hart.step().unwrap();
        assert_eq!(hart.pc(), 14);
        assert_eq!(hart.step(), Err(Exception::FetchFault));
        assert_eq!(hart.pc(), 14);
    }

    #[test]
    fn check_sra() {
        let mut hart = hart();
        // sra t2, t0, t1 (0x4062d3b3)
        write_instr(&mut hart, 0, 0x4062_d3b3);
        hart.set_x(5, 64);
        hart.set_x(6, 3);
        hart.step().unwrap();
        assert_eq!(hart.x(7), 8);
        assert_eq!(hart.pc(), 4);
    }

    #[test]
    fn check_sra_preserves_sign() {
        let mut hart = hart();
        write_instr(&mut hart, 0, sra!(x7, x5, x6));
        hart.set_x(5, 0xf000_0f00);
        hart.set_x(6, 4);
        hart.step().unwrap();
        assert_eq!(hart.x(7), 0xff00_00f0);
    }

    #[test]
    fn check_srai_preserves_sign() {
        let mut hart = hart();
        write_instr(&mut hart, 0, srai!(x1, x2, 4));
        hart.set_x(2, 0xf000_0f00);
        hart.step().unwrap();
        assert_eq!(hart.x(1), 0xff00_00f0);
    }

    #[test]
    fn check_lui_auipc() {
        let mut hart = hart();
        write_instr(&mut hart, 0, lui!(x2, 53));
        write_instr(&mut hart, 4, auipc!(x4, 53));
        hart.step().unwrap();
        assert_eq!(hart.x(2), 53 << 12);
        hart.step().unwrap();
        assert_eq!(hart.x(4), 4 + (53 << 12));
        assert_eq!(hart.pc(), 8);
    }

    #[test]
    fn check_load_store_word() {
        let mut hart = hart();
        write_instr(&mut hart, 0, sw!(x1, x2, -16));
        write_instr(&mut hart, 4, lw!(x3, x2, -16));
        hart.set_x(1, 0xabcd_ef12);
        hart.set_x(2, 0x800 + 0x10);
        hart.step().unwrap();
        hart.step().unwrap();
        assert_eq!(hart.x(3), 0xabcd_ef12);
    }

    #[test]
    fn check_lb_sign_extends() {
        let mut hart = hart();
        write_instr(&mut hart, 0, lb!(x1, x2, 16));
        hart.set_x(2, 0x800 - 0x10);
        hart.store(0x800, 0xff, Wordsize::Byte).unwrap();
        hart.step().unwrap();
        assert_eq!(hart.x(1), 0xffff_ffff);
    }

    #[test]
    fn check_lbu_zero_extends() {
        let mut hart = hart();
        write_instr(&mut hart, 0, lbu!(x1, x2, 16));
        hart.set_x(2, 0x800 - 0x10);
        hart.store(0x800, 0xff, Wordsize::Byte).unwrap();
        hart.step().unwrap();
        assert_eq!(hart.x(1), 0x0000_00ff);
    }

    #[test]
    fn check_lh_sign_extends() {
        let mut hart = hart();
        write_instr(&mut hart, 0, lh!(x1, x2, 0));
        hart.set_x(2, 0x800);
        hart.store(0x800, 0xff92, Wordsize::Halfword).unwrap();
        hart.step().unwrap();
        assert_eq!(hart.x(1), 0xffff_ff92);
    }

    #[test]
    fn check_load_fault_leaves_state() {
        let mut hart = hart();
        write_instr(&mut hart, 0, lw!(x1, x2, 0));
        hart.set_x(1, 7);
        hart.set_x(2, 0x10_0000);
        assert_eq!(hart.step(), Err(Exception::LoadFault));
        assert_eq!(hart.x(1), 7);
        assert_eq!(hart.pc(), 0);
    }

    #[test]
    fn check_store_fault() {
        let mut hart = hart();
        write_instr(&mut hart, 0, sw!(x1, x2, 0));
        hart.set_x(2, 0x10_0000);
        assert_eq!(hart.step(), Err(Exception::StoreFault));
        assert_eq!(hart.pc(), 0);
    }

    #[test]
    fn check_div_by_zero() {
        let mut hart = hart();
        write_instr(&mut hart, 0, div!(x1, x2, x3));
        hart.set_x(2, 42);
        hart.set_x(3, 0);
        hart.step().unwrap();
        assert_eq!(hart.x(1), 0xffff_ffff);
    }

    #[test]
    fn check_divu_by_zero() {
        let mut hart = hart();
        write_instr(&mut hart, 0, divu!(x1, x2, x3));
        hart.set_x(2, 42);
        hart.set_x(3, 0);
        hart.step().unwrap();
        assert_eq!(hart.x(1), u32::MAX);
    }

    #[test]
    fn check_rem_by_zero_returns_dividend() {
        let mut hart = hart();
        write_instr(&mut hart, 0, rem!(x1, x2, x3));
        write_instr(&mut hart, 4, remu!(x4, x2, x3));
        hart.set_x(2, interpret_i32_as_unsigned(-42));
        hart.set_x(3, 0);
        hart.step().unwrap();
        hart.step().unwrap();
        assert_eq!(hart.x(1), interpret_i32_as_unsigned(-42));
        assert_eq!(hart.x(4), interpret_i32_as_unsigned(-42));
    }

    #[test]
    fn check_div_overflow() {
        let mut hart = hart();
        write_instr(&mut hart, 0, div!(x1, x2, x3));
        write_instr(&mut hart, 4, rem!(x4, x2, x3));
        hart.set_x(2, 0x8000_0000); // i32::MIN
        hart.set_x(3, interpret_i32_as_unsigned(-1));
        hart.step().unwrap();
        hart.step().unwrap();
        assert_eq!(hart.x(1), 0x8000_0000);
        assert_eq!(hart.x(4), 0);
    }

    #[test]
    fn check_div_rounds_towards_zero() {
        let mut hart = hart();
        write_instr(&mut hart, 0, div!(x1, x2, x3));
        hart.set_x(2, 10);
        hart.set_x(3, interpret_i32_as_unsigned(-3));
        hart.step().unwrap();
        assert_eq!(hart.x(1), interpret_i32_as_unsigned(-3));
    }

    #[test]
    fn check_mulh() {
        let mut hart = hart();
        write_instr(&mut hart, 0, mulh!(x1, x2, x3));
        hart.set_x(2, 0x7fff_ffff);
        hart.set_x(3, 4);
        hart.step().unwrap();
        assert_eq!(hart.x(1), 1);
    }

    #[test]
    fn check_mulhu() {
        let mut hart = hart();
        write_instr(&mut hart, 0, mulhu!(x1, x2, x3));
        hart.set_x(2, 0xffff_ffff);
        hart.set_x(3, 4);
        hart.step().unwrap();
        assert_eq!(hart.x(1), 3);
    }

    #[test]
    fn check_mulhsu() {
        let mut hart = hart();
        write_instr(&mut hart, 0, mulhsu!(x1, x2, x3));
        hart.set_x(2, 0xffff_ffff);
        hart.set_x(3, 4);
        hart.step().unwrap();
        assert_eq!(hart.x(1), 0xffff_ffff);
    }

    #[test]
    fn check_sltiu_sign_extends_then_compares_unsigned() {
        let mut hart = hart();
        write_instr(&mut hart, 0, sltiu!(x1, x2, -1));
        hart.set_x(2, 10);
        hart.step().unwrap();
        // -1 sign-extends to 0xffffffff, so 10 < imm
        assert_eq!(hart.x(1), 1);
    }

    #[test]
    fn check_ebreak_halts() {
        let mut hart = hart();
        write_instr(&mut hart, 0, ebreak!());
        assert_eq!(hart.step(), Err(Exception::Break));
        assert_eq!(hart.pc(), 0);
    }

    #[test]
    fn check_print_syscall() {
        let mut hart = hart();
        write_instr(&mut hart, 0, ecall!());
        hart.memory.write_range(128, b"VM says hi!").unwrap();
        hart.set_x(REG_A0, 128);
        hart.set_x(REG_A1, 11);
        hart.set_x(REG_A7, 1);
        hart.step().unwrap();
        assert_eq!(hart.flush_console(), b"VM says hi!");
        assert_eq!(hart.x(REG_A0), 0);
        assert_eq!(hart.pc(), 4);
    }

    #[test]
    fn check_print_with_bad_buffer_faults() {
        let mut hart = hart();
        write_instr(&mut hart, 0, ecall!());
        hart.set_x(REG_A0, VmConfig::default().mem_size - 4);
        hart.set_x(REG_A1, 100);
        hart.set_x(REG_A7, 1);
        assert_eq!(hart.step(), Err(Exception::LoadFault));
        assert_eq!(hart.pc(), 0);
    }

    #[test]
    fn check_draw_syscall_publishes_vram() {
        let mut hart = hart();
        write_instr(&mut hart, 0, ecall!());
        write_instr(&mut hart, 4, ecall!());
        let vram_base = VmConfig::default().vram_base;
        hart.memory.write_range(vram_base, &[7; 16]).unwrap();
        hart.set_x(REG_A7, 2);
        hart.step().unwrap();
        hart.step().unwrap();

        let first = hart.take_frame().unwrap();
        let second = hart.take_frame().unwrap();
        assert_eq!(first.seq, 0);
        assert_eq!(second.seq, 1);
        assert_eq!(first.data.len(), VmConfig::default().vram_len as usize);
        assert_eq!(&first.data[..16], &[7; 16]);
        assert!(hart.take_frame().is_none());
    }

    #[test]
    fn check_unknown_syscall_returns_minus_one() {
        let mut hart = hart();
        write_instr(&mut hart, 0, ecall!());
        hart.set_x(REG_A7, 0x77);
        hart.step().unwrap();
        assert_eq!(hart.x(REG_A0), 0xffff_ffff);
        assert_eq!(hart.pc(), 4);
    }

    #[test]
    fn check_reset_syscall_reaches_host() {
        let mut hart = hart();
        write_instr(&mut hart, 0, ecall!());
        hart.set_x(REG_A7, 0);
        hart.set_x(REG_A0, 55);
        hart.step().unwrap();
        assert_eq!(hart.x(REG_A0), 0);
        assert_eq!(hart.pc(), 4);
    }

    #[test]
    fn check_file_syscalls_through_in_process_host() {
        let mut path = std::env::temp_dir();
        path.push(format!("rv32vm-hart-{}-file", std::process::id()));
        let path_bytes = path.to_str().unwrap().as_bytes();

        let mut hart = hart();
        // Guest memory layout: the path at 0x600, the write buffer at
        // 0x700, the read-back buffer at 0x740
        hart.memory.write_range(0x600, path_bytes).unwrap();
        hart.memory.write_range(0x700, b"squeak").unwrap();

        // open(path, len, O_RDWR|O_CREAT|O_TRUNC)
        write_instr(&mut hart, 0, ecall!());
        hart.set_x(REG_A7, 0x0a);
        hart.set_x(REG_A0, 0x600);
        hart.set_x(REG_A1, path_bytes.len() as u32);
        hart.set_x(REG_A2, 0o2 | 0o100 | 0o1000);
        hart.step().unwrap();
        let fd = hart.x(REG_A0);
        assert_eq!(fd, 3);

        // write(fd, 0x700, 6)
        write_instr(&mut hart, 4, ecall!());
        hart.set_x(REG_A7, 0x0e);
        hart.set_x(REG_A0, fd);
        hart.set_x(REG_A1, 0x700);
        hart.set_x(REG_A2, 6);
        hart.step().unwrap();
        assert_eq!(hart.x(REG_A0), 6);

        // seek(fd, 0, SEEK_SET)
        write_instr(&mut hart, 8, ecall!());
        hart.set_x(REG_A7, 0x0c);
        hart.set_x(REG_A0, fd);
        hart.set_x(REG_A1, 0);
        hart.set_x(REG_A2, 0);
        hart.step().unwrap();
        assert_eq!(hart.x(REG_A0), 0);

        // read(fd, 0x740, 16)
        write_instr(&mut hart, 12, ecall!());
        hart.set_x(REG_A7, 0x0d);
        hart.set_x(REG_A0, fd);
        hart.set_x(REG_A1, 0x740);
        hart.set_x(REG_A2, 16);
        hart.step().unwrap();
        assert_eq!(hart.x(REG_A0), 6);
        assert_eq!(hart.memory.read_range(0x740, 6).unwrap(), b"squeak");

        // close(fd)
        write_instr(&mut hart, 16, ecall!());
        hart.set_x(REG_A7, 0x0b);
        hart.set_x(REG_A0, fd);
        hart.step().unwrap();
        assert_eq!(hart.x(REG_A0), 0);

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn check_pipe_syscalls_through_in_process_host() {
        let peer = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let address = format!("127.0.0.1:{}", peer.local_addr().unwrap().port());

        let mut hart = hart();
        hart.memory.write_range(0x600, address.as_bytes()).unwrap();
        hart.memory
            .write(0x600 + address.len() as u32, 0, Wordsize::Byte)
            .unwrap();

        // socket("127.0.0.1:<port>")
        write_instr(&mut hart, 0, ecall!());
        hart.set_x(REG_A7, 0x0f);
        hart.set_x(REG_A0, 0x600);
        hart.step().unwrap();
        let fd = hart.x(REG_A0);
        assert_eq!(fd, 3);

        // read(fd, 0x700, 64) on an empty pipe gives EAGAIN
        write_instr(&mut hart, 4, ecall!());
        hart.set_x(REG_A7, 0x0d);
        hart.set_x(REG_A0, fd);
        hart.set_x(REG_A1, 0x700);
        hart.set_x(REG_A2, 64);
        hart.step().unwrap();
        assert_eq!(hart.x(REG_A0), interpret_i32_as_unsigned(STATUS_EAGAIN));
    }

    /// Host handle that records requests and answers with a fixed
    /// status
    struct RecordingHost {
        requests: std::rc::Rc<std::cell::RefCell<Vec<HostRequest>>>,
        status: i32,
    }

    impl HostOs for RecordingHost {
        fn call(&mut self, request: &HostRequest) -> HostResponse {
            self.requests.borrow_mut().push(request.clone());
            HostResponse::ok(self.status)
        }
    }

    #[test]
    fn check_unknown_syscall_does_not_reach_host() {
        let requests = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let host = RecordingHost {
            requests: std::rc::Rc::clone(&requests),
            status: 0,
        };
        let mut hart = Hart::with_host(VmConfig::default(), Box::new(host));
        write_instr(&mut hart, 0, ecall!());
        hart.set_x(REG_A7, 0xdead);
        hart.step().unwrap();
        assert_eq!(hart.x(REG_A0), 0xffff_ffff);
        assert!(requests.borrow().is_empty());
    }

    #[test]
    fn check_close_marshals_negative_fd() {
        let requests = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let host = RecordingHost {
            requests: std::rc::Rc::clone(&requests),
            status: -1,
        };
        let mut hart = Hart::with_host(VmConfig::default(), Box::new(host));
        write_instr(&mut hart, 0, ecall!());
        hart.set_x(REG_A7, 0x0b);
        hart.set_x(REG_A0, interpret_i32_as_unsigned(-5));
        hart.step().unwrap();
        assert_eq!(
            requests.borrow().as_slice(),
            &[HostRequest::Close { fd: -5 }]
        );
        assert_eq!(hart.x(REG_A0), 0xffff_ffff);
    }

    #[test]
    fn check_disassembly() {
        let hart = hart();
        assert_eq!(
            hart.disassemble(0x0062_83b3).as_deref(),
            Some("add x7, x5, x6")
        );
        assert_eq!(hart.disassemble(0x0000_0073).as_deref(), Some("ecall"));
        assert_eq!(hart.disassemble(0xffff_ffff), None);
    }

    #[test]
    fn check_host_config_defaults() {
        let config = HostConfig::default();
        assert_eq!(config.descriptor_start, 3);
        assert_eq!(config.pipe_queue_capacity, 32);
        assert_eq!(config.call_deadline.as_millis(), 5000);
    }
}
