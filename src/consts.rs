pub const SUZ_ADDR: u16 = 0xFC00;
pub const MIK_ADDR: u16 = 0xFD00;
pub const ROM_ADDR: u16 = 0xFE00;
pub const MMC_ADDR: u16 = 0xFFF9;
pub const RESV_ADDR: u16 = 0xFFFC;

pub const SUZ_PAGE: u8 = 0xFC;
pub const MIK_PAGE: u8 = 0xFD;
pub const ROM_PAGE: u8 = 0xFE;
pub const VEC_PAGE: u8 = 0xFF;

pub const ROM_SIZE: usize = 0x200;
pub const RAM_SIZE: usize = 0x10000;

// "The crystal is the only source of timing information in the system. The basic timing tick of the system is 62.5 ns."
pub const CRYSTAL_FREQ: u32 = 16_000_000;

/* "
A page mode op-code read takes 4 ticks, a normal read or write to RAM takes 5 ticks."
" */
pub const FAST_CYCLE_TICKS: u64 = 4;
pub const SLOW_CYCLE_TICKS: u64 = 5;
pub const RAM_CYCLE_TICKS: u64 = 5;

/*
Cycle                              Min       Max
---------------------------------------------------
Suzy Hardware(write)               5          5
Suzy Hardware(read)                9         15
*/
pub const SUZY_WRITE_TICKS: u64 = 5;
pub const SUZY_READ_TICKS: u64 = 9;
// "The CPU cycle that performed the actual read uses 15 ticks of the clock."
pub const CART_READ_TICKS: u64 = 15;

pub const MIKEY_ACCESS_TICKS: u64 = 5;

// Bus time taken by one 8 byte display DMA burst: 6 page mode reads and 2 normal ones.
pub const DISPLAY_DMA_FAST_CYCLES: u64 = 6;
pub const DISPLAY_DMA_SLOW_CYCLES: u64 = 2;

pub const MAPCTL_SEQ_BIT: u8 = 0b1000_0000;
pub const MAPCTL_VEC_BIT: u8 = 0b0000_1000;
pub const MAPCTL_ROM_BIT: u8 = 0b0000_0100;
pub const MAPCTL_MIK_BIT: u8 = 0b0000_0010;
pub const MAPCTL_SUZ_BIT: u8 = 0b0000_0001;

pub const TIM0BKUP: u16 = 0xfd00;
pub const TIM2CNT: u16 = 0xfd0a;
pub const TIM4CTLA: u16 = 0xfd11;
pub const TIM7CTLB: u16 = 0xfd1f;
pub const AUD0VOL: u16 = 0xfd20;
pub const AUD3MISC: u16 = 0xfd3f;
pub const ATTEN_A: u16 = 0xfd40;
pub const ATTEN_B: u16 = 0xfd41;
pub const ATTEN_C: u16 = 0xfd42;
pub const ATTEN_D: u16 = 0xfd43;
pub const MPAN: u16 = 0xfd44;
pub const MSTEREO: u16 = 0xfd50;
pub const INTRST: u16 = 0xfd80;
pub const INTSET: u16 = 0xfd81;
pub const SYSCTL1: u16 = 0xfd87;
pub const MIKEYHREV: u16 = 0xfd88;
pub const IODIR: u16 = 0xfd8a;
pub const IODAT: u16 = 0xfd8b;
pub const SERCTL: u16 = 0xfd8c;
pub const SERDAT: u16 = 0xfd8d;
pub const SDONEACK: u16 = 0xfd90;
pub const CPUSLEEP: u16 = 0xfd91;
pub const DISPCTL: u16 = 0xfd92;
pub const PBKUP: u16 = 0xfd93;
pub const DISPADRL: u16 = 0xfd94;
pub const DISPADRH: u16 = 0xfd95;
pub const MTEST0: u16 = 0xfd9c;
pub const MTEST1: u16 = 0xfd9d;
pub const MTEST2: u16 = 0xfd9e;
pub const GREEN0: u16 = 0xfda0;
pub const GREENF: u16 = 0xfdaf;
pub const BLUERED0: u16 = 0xfdb0;
pub const BLUEREDF: u16 = 0xfdbf;

pub const SYSCTL1_CAS: u8 = 0b0000_0001;
pub const SYSCTL1_POWER: u8 = 0b0000_0010;

pub const INT_TIMER0: u8 = 0b0000_0001;
pub const INT_TIMER1: u8 = 0b0000_0010;
pub const INT_TIMER2: u8 = 0b0000_0100;
pub const INT_TIMER3: u8 = 0b0000_1000;
pub const INT_TIMER4: u8 = 0b0001_0000;
pub const INT_TIMER5: u8 = 0b0010_0000;
pub const INT_TIMER6: u8 = 0b0100_0000;
pub const INT_TIMER7: u8 = 0b1000_0000;

pub const TMPADRL: u16 = 0xFC00; // "Temporary address"
pub const TMPADRH: u16 = 0xFC01;
pub const TILTACUML: u16 = 0xFC02; // "Accumulator for tilt value"
pub const TILTACUMH: u16 = 0xFC03;
pub const HOFFL: u16 = 0xFC04; // "Offset to H edge of screen"
pub const VOFFL: u16 = 0xFC06; // "Offset to V edge of screen"
pub const VIDBASL: u16 = 0xFC08; // "Base Address of Video Build Buffer"
pub const COLLBASL: u16 = 0xFC0A; // "Base Address of Coll Build Buffer"
pub const VIDADRL: u16 = 0xFC0C; // "Current Video Build Address"
pub const COLLADRL: u16 = 0xFC0E; // "Current Collision Build Address"
pub const SCBNEXTL: u16 = 0xFC10; // "Address of Next SCB"
pub const SCBNEXTH: u16 = 0xFC11;
pub const SPRDLINEL: u16 = 0xFC12; // "Start of Sprite Data Line Address"
pub const SPRDLINEH: u16 = 0xFC13;
pub const HPOSSTRTL: u16 = 0xFC14; // "Starting Hpos"
pub const HPOSSTRTH: u16 = 0xFC15;
pub const VPOSSTRTL: u16 = 0xFC16; // "Starting Vpos"
pub const VPOSSTRTH: u16 = 0xFC17;
pub const SPRHSIZL: u16 = 0xFC18; // "H Size"
pub const SPRHSIZH: u16 = 0xFC19;
pub const SPRVSIZL: u16 = 0xFC1A; // "V Size"
pub const SPRVSIZH: u16 = 0xFC1B;
pub const STRETCHL: u16 = 0xFC1C; // "H Size Adder"
pub const STRETCHH: u16 = 0xFC1D;
pub const TILTL: u16 = 0xFC1E; // "H Position Adder"
pub const TILTH: u16 = 0xFC1F;
pub const SPRDOFFL: u16 = 0xFC20; // "Offset to Next Sprite Data Line"
pub const SPRVPOSL: u16 = 0xFC22; // "Current Vpos"
pub const COLLOFFL: u16 = 0xFC24; // "Offset to Collision Depository"
pub const VSIZACUML: u16 = 0xFC26; // "Vertical Size Accumulator"
pub const VSIZACUMH: u16 = 0xFC27;
pub const HSIZOFFL: u16 = 0xFC28; // "Horizontal Size Offset"
pub const VSIZOFFL: u16 = 0xFC2A; // "Vertical Size Offset"
pub const SCBADRL: u16 = 0xFC2C; // "Address of Current SCB"
pub const PROCADRL: u16 = 0xFC2E; // "Current Spr Data Proc Address"
pub const PROCADRH: u16 = 0xFC2F;
pub const MATHD: u16 = 0xFC52;
pub const MATHC: u16 = 0xFC53;
pub const MATHB: u16 = 0xFC54;
pub const MATHA: u16 = 0xFC55;
pub const MATHP: u16 = 0xFC56;
pub const MATHN: u16 = 0xFC57;
pub const MATHH: u16 = 0xFC60;
pub const MATHG: u16 = 0xFC61;
pub const MATHF: u16 = 0xFC62;
pub const MATHE: u16 = 0xFC63;
pub const MATHM: u16 = 0xFC6C;
pub const MATHL: u16 = 0xFC6D;
pub const MATHK: u16 = 0xFC6E;
pub const MATHJ: u16 = 0xFC6F;
pub const SPRCTL0: u16 = 0xFC80; // "Sprite Control Bits 0 (W)"
pub const SPRCTL1: u16 = 0xFC81; // "Sprite Control Bits 1 (W)(U)"
pub const SPRCOLL: u16 = 0xFC82; // "Sprite Collision Number (W)"
pub const SPRINIT: u16 = 0xFC83; // "Sprite Initialization Bits (W)(U)"
pub const SUZYHREV: u16 = 0xFC88;
pub const SUZYBUSEN: u16 = 0xFC90; // "Suzy Bus Enable (W)"
pub const SPRGO: u16 = 0xFC91; // "Sprite Process Start Bit (W)"
pub const SPRSYS: u16 = 0xFC92; // "System Control Bits (R/W)"
pub const JOYSTICK: u16 = 0xFCB0;
pub const SWITCHES: u16 = 0xFCB1;
pub const RCART0: u16 = 0xFCB2;
pub const RCART1: u16 = 0xFCB3;

pub const SPRCTL1_LITERAL: u8 = 0b1000_0000;
pub const SPRCTL1_RELOAD_DEPTH: u8 = 0b0011_0000;
pub const SPRCTL1_REUSE_PALETTE: u8 = 0b0000_1000;
pub const SPRCTL1_SKIP_SPRITE: u8 = 0b0000_0100;
pub const SPRCTL1_DRAW_QUAD: u8 = 0b0000_0011;

pub const SPRCTL0_BPP: u8 = 0b1100_0000;
pub const SPRCTL0_HFLIP: u8 = 0b0010_0000;
pub const SPRCTL0_VFLIP: u8 = 0b0001_0000;
pub const SPRCTL0_SPR_TYPE: u8 = 0b0000_0111;

pub const SPRCOLL_DONT_COLLIDE: u8 = 0b0010_0000;
pub const SPRCOLL_NUMBER: u8 = 0b0000_1111;

pub const SPRGO_GO: u8 = 0b0000_0001;
pub const SPRGO_EVERON: u8 = 0b0000_0100;

pub const SUZYBUSEN_ENABLE: u8 = 0b0000_0001;
