//! Synth programs: per-sample micro-code and modulation waveforms

use crate::sample::PcmData;

/// Number of synth execution contexts (volume, panning, slide, special)
pub const SYNTH_CONTEXTS: usize = 4;

/// Number of shared 16-bit synth variables
pub const SYNTH_VARIABLES: usize = 16;

/// One decoded synth instruction
///
/// A non-negative opcode selects a synth-native operation; a negative
/// opcode executes the track effect `!opcode` through the effect table.
/// The upper nibble of `src_dst` selects the source variable, the lower
/// nibble the destination variable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SynthInstruction {
    /// Operation code
    pub opcode: i8,
    /// Packed source/destination variable indices
    pub src_dst: u8,
    /// Immediate data word
    pub data: u16,
}

impl SynthInstruction {
    /// Build an instruction from its parts
    pub const fn new(opcode: i8, src: u8, dst: u8, data: u16) -> Self {
        Self {
            opcode,
            src_dst: (src << 4) | (dst & 0x0F),
            data,
        }
    }

    /// Source variable index
    pub const fn src(&self) -> usize {
        (self.src_dst >> 4) as usize
    }

    /// Destination variable index
    pub const fn dst(&self) -> usize {
        (self.src_dst & 0x0F) as usize
    }
}

/// A micro-program attached to a sample
///
/// Four independent contexts execute the same code from different entry
/// points; each context also has sustain-release, NNA and DNA entry
/// points copied into the voice when the respective event fires.
#[derive(Debug, Clone, Default)]
pub struct SynthProgram {
    /// Program name
    pub name: String,
    /// Instruction sequence
    pub code: Vec<SynthInstruction>,
    /// Entry points per context
    pub entry: [u16; SYNTH_CONTEXTS],
    /// Sustain release entry points per context
    pub sustain_entry: [u16; SYNTH_CONTEXTS],
    /// NNA trigger entry points per context
    pub nna_entry: [u16; SYNTH_CONTEXTS],
    /// DNA trigger entry points per context
    pub dna_entry: [u16; SYNTH_CONTEXTS],
    /// Which contexts take their NNA entry point (bit per context)
    pub use_nna_flags: u8,
    /// Which contexts take their DNA entry point (bit per context)
    pub use_dna_flags: u8,
    /// Which contexts take their sustain entry point (bit per context)
    pub use_sustain_flags: u8,
    /// Which context positions survive a sample swap (bit per context)
    pub pos_keep_mask: u8,
    /// Initial values of the sixteen shared variables
    pub variables: [i16; SYNTH_VARIABLES],
    /// Initial condition code words per context
    pub condition: [u16; SYNTH_CONTEXTS],
    /// Modulation waveforms owned by this program
    pub waveforms: Vec<SynthWaveform>,
}

impl SynthProgram {
    /// Program over the given code with all entries at 0
    pub fn from_code(code: Vec<SynthInstruction>) -> Self {
        Self {
            code,
            ..Self::default()
        }
    }

    /// Get a waveform by index
    pub fn waveform(&self, number: u16) -> Option<&SynthWaveform> {
        self.waveforms.get(number as usize)
    }
}

/// Synth instruction opcodes
///
/// Non-negative opcodes only; a negative opcode byte executes the track
/// effect `!opcode` instead. Operands resolve uniformly as
/// `immediate + var[src]`; destination writes go to `var[dst]`, with
/// `dst = 15` selecting the single-register form of 32-bit operations
/// and any other `dst` the little-endian register pair `(dst, dst + 1)`.
pub mod op {
    // Control flow
    pub const STOP: i8 = 0x00;
    pub const KILL: i8 = 0x01;
    pub const WAIT: i8 = 0x02;
    pub const WAITVOL: i8 = 0x03;
    pub const WAITPAN: i8 = 0x04;
    pub const WAITSLD: i8 = 0x05;
    pub const WAITSPC: i8 = 0x06;
    pub const JUMP: i8 = 0x07;
    pub const JUMPEQ: i8 = 0x08;
    pub const JUMPNE: i8 = 0x09;
    pub const JUMPPL: i8 = 0x0A;
    pub const JUMPMI: i8 = 0x0B;
    pub const JUMPLT: i8 = 0x0C;
    pub const JUMPLE: i8 = 0x0D;
    pub const JUMPGT: i8 = 0x0E;
    pub const JUMPGE: i8 = 0x0F;
    pub const JUMPVS: i8 = 0x10;
    pub const JUMPVC: i8 = 0x11;
    pub const JUMPCS: i8 = 0x12;
    pub const JUMPCC: i8 = 0x13;
    pub const JUMPLS: i8 = 0x14;
    pub const JUMPHI: i8 = 0x15;
    pub const JUMPVOL: i8 = 0x16;
    pub const JUMPPAN: i8 = 0x17;
    pub const JUMPSLD: i8 = 0x18;
    pub const JUMPSPC: i8 = 0x19;
    pub const CALL: i8 = 0x1A;
    pub const RET: i8 = 0x1B;
    pub const POSVAR: i8 = 0x1C;
    pub const NOP: i8 = 0x1D;

    // Arithmetic
    pub const LOAD: i8 = 0x1E;
    pub const ADD: i8 = 0x1F;
    pub const ADDX: i8 = 0x20;
    pub const SUB: i8 = 0x21;
    pub const SUBX: i8 = 0x22;
    pub const CMP: i8 = 0x23;
    pub const MULU: i8 = 0x24;
    pub const MULS: i8 = 0x25;
    pub const DMULU: i8 = 0x26;
    pub const DMULS: i8 = 0x27;
    pub const DIVU: i8 = 0x28;
    pub const DIVS: i8 = 0x29;
    pub const MODU: i8 = 0x2A;
    pub const MODS: i8 = 0x2B;
    pub const DDIVU: i8 = 0x2C;
    pub const DDIVS: i8 = 0x2D;

    // Bit operations
    pub const ASHL: i8 = 0x2E;
    pub const ASHR: i8 = 0x2F;
    pub const LSHL: i8 = 0x30;
    pub const LSHR: i8 = 0x31;
    pub const ROL: i8 = 0x32;
    pub const ROR: i8 = 0x33;
    pub const ROLX: i8 = 0x34;
    pub const RORX: i8 = 0x35;
    pub const OR: i8 = 0x36;
    pub const AND: i8 = 0x37;
    pub const XOR: i8 = 0x38;
    pub const NOT: i8 = 0x39;
    pub const NEG: i8 = 0x3A;
    pub const NEGX: i8 = 0x3B;
    pub const EXTB: i8 = 0x3C;
    pub const EXT: i8 = 0x3D;
    pub const XCHG: i8 = 0x3E;
    pub const SWAP: i8 = 0x3F;

    // Queries
    pub const GETWAVE: i8 = 0x40;
    pub const GETWLEN: i8 = 0x41;
    pub const GETWPOS: i8 = 0x42;
    pub const GETCHAN: i8 = 0x43;
    pub const GETNOTE: i8 = 0x44;
    pub const GETRANS: i8 = 0x45;
    pub const GETPTCH: i8 = 0x46;
    pub const GETPER: i8 = 0x47;
    pub const GETFX: i8 = 0x48;
    pub const GETARPW: i8 = 0x49;
    pub const GETARPV: i8 = 0x4A;
    pub const GETARPL: i8 = 0x4B;
    pub const GETARPP: i8 = 0x4C;
    pub const GETVIBW: i8 = 0x4D;
    pub const GETVIBV: i8 = 0x4E;
    pub const GETVIBL: i8 = 0x4F;
    pub const GETVIBP: i8 = 0x50;
    pub const GETTRMW: i8 = 0x51;
    pub const GETTRMV: i8 = 0x52;
    pub const GETTRML: i8 = 0x53;
    pub const GETTRMP: i8 = 0x54;
    pub const GETPANW: i8 = 0x55;
    pub const GETPANV: i8 = 0x56;
    pub const GETPANL: i8 = 0x57;
    pub const GETPANP: i8 = 0x58;
    pub const GETRND: i8 = 0x59;
    pub const GETSINE: i8 = 0x5A;

    // Sound
    pub const PORTAUP: i8 = 0x5B;
    pub const PORTADN: i8 = 0x5C;
    pub const VIBSPD: i8 = 0x5D;
    pub const VIBDPTH: i8 = 0x5E;
    pub const VIBWAVE: i8 = 0x5F;
    pub const VIBWAVP: i8 = 0x60;
    pub const VIBRATO: i8 = 0x61;
    pub const VIBVAL: i8 = 0x62;
    pub const ARPSPD: i8 = 0x63;
    pub const ARPWAVE: i8 = 0x64;
    pub const ARPWAVP: i8 = 0x65;
    pub const ARPEGIO: i8 = 0x66;
    pub const ARPVAL: i8 = 0x67;
    pub const SETWAVE: i8 = 0x68;
    pub const ISETWAV: i8 = 0x69;
    pub const SETWAVP: i8 = 0x6A;
    pub const SETRANS: i8 = 0x6B;
    pub const SETNOTE: i8 = 0x6C;
    pub const SETPTCH: i8 = 0x6D;
    pub const SETPER: i8 = 0x6E;
    pub const RESET: i8 = 0x6F;
    pub const VOLSLUP: i8 = 0x70;
    pub const VOLSLDN: i8 = 0x71;
    pub const TRMSPD: i8 = 0x72;
    pub const TRMDPTH: i8 = 0x73;
    pub const TRMWAVE: i8 = 0x74;
    pub const TRMWAVP: i8 = 0x75;
    pub const TREMOLO: i8 = 0x76;
    pub const TRMVAL: i8 = 0x77;
    pub const PANLEFT: i8 = 0x78;
    pub const PANRGHT: i8 = 0x79;
    pub const PANSPD: i8 = 0x7A;
    pub const PANDPTH: i8 = 0x7B;
    pub const PANWAVE: i8 = 0x7C;
    pub const PANWAVP: i8 = 0x7D;
    pub const PANNOLO: i8 = 0x7E;
    pub const PANVAL: i8 = 0x7F;
}

/// A short PCM table used as a modulation shape, not as audio
#[derive(Debug, Clone, Default)]
pub struct SynthWaveform {
    /// Waveform name
    pub name: String,
    /// Shape data
    pub data: PcmData,
    /// Loop start frame
    pub repeat_start: u32,
    /// Loop length in frames
    pub repeat_length: u32,
}

impl SynthWaveform {
    /// Waveform over the given 16-bit values, looping over its whole length
    pub fn from_values(data: Vec<i16>) -> Self {
        let len = data.len() as u32;
        Self {
            name: String::new(),
            data: PcmData::Mono16(data),
            repeat_start: 0,
            repeat_length: len,
        }
    }

    /// Shape value at `index`, widened to 16 bits
    pub fn value(&self, index: u32) -> i16 {
        self.data.frame(index)
    }

    /// Length in frames
    pub fn len(&self) -> u32 {
        self.data.len()
    }

    /// True when the waveform has no frames
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
