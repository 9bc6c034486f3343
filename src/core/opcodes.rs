//! Bitcoin script opcodes
//!
//! The legacy opcode table: byte values, assembly names and which opcodes the
//! interpreter refuses to run.

/// Script opcodes (data pushes 0x01-0x4b are not opcodes and are handled by
/// the script parser)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    // Constants
    /// Push an empty byte string
    Zero = 0x00,
    /// Next byte holds the push length
    PushData1 = 0x4c,
    /// Next two bytes hold the push length
    PushData2 = 0x4d,
    /// Next four bytes hold the push length
    PushData4 = 0x4e,
    /// Push -1
    Negate1 = 0x4f,
    /// Push 1
    Num1 = 0x51,
    Num2 = 0x52,
    Num3 = 0x53,
    Num4 = 0x54,
    Num5 = 0x55,
    Num6 = 0x56,
    Num7 = 0x57,
    Num8 = 0x58,
    Num9 = 0x59,
    Num10 = 0x5a,
    Num11 = 0x5b,
    Num12 = 0x5c,
    Num13 = 0x5d,
    Num14 = 0x5e,
    Num15 = 0x5f,
    Num16 = 0x60,

    // Flow control
    /// Do nothing
    Nop = 0x61,
    If = 0x63,
    NotIf = 0x64,
    Else = 0x67,
    EndIf = 0x68,
    /// Fail unless the top item is true
    Verify = 0x69,
    /// Fail unconditionally
    Return = 0x6a,

    // Stack
    ToAltStack = 0x6b,
    FromAltStack = 0x6c,
    Drop2 = 0x6d,
    Dup2 = 0x6e,
    Dup3 = 0x6f,
    Over2 = 0x70,
    Rot2 = 0x71,
    Swap2 = 0x72,
    IfDup = 0x73,
    Depth = 0x74,
    Drop = 0x75,
    /// Duplicate the top item
    Dup = 0x76,
    Nip = 0x77,
    Over = 0x78,
    Pick = 0x79,
    Roll = 0x7a,
    Rot = 0x7b,
    Swap = 0x7c,
    Tuck = 0x7d,

    // Splice
    Size = 0x82,

    // Bitwise logic
    /// Push 1 if the top two items are byte-equal
    Equal = 0x87,
    EqualVerify = 0x88,

    // Arithmetic
    Add1 = 0x8b,
    Sub1 = 0x8c,
    Negate = 0x8f,
    Abs = 0x90,
    Not = 0x91,
    NotEqual0 = 0x92,
    Add = 0x93,
    Sub = 0x94,
    Mul = 0x95,
    BoolAnd = 0x9a,
    BoolOr = 0x9b,
    NumEqual = 0x9c,
    NumEqualVerify = 0x9d,
    NumNotEqual = 0x9e,
    LessThan = 0x9f,
    GreaterThan = 0xa0,
    LessThanOrEqual = 0xa1,
    GreaterThanOrEqual = 0xa2,
    Min = 0xa3,
    Max = 0xa4,
    Within = 0xa5,

    // Crypto
    Ripemd160 = 0xa6,
    Sha1 = 0xa7,
    Sha256 = 0xa8,
    /// Replace the top item with its hash160
    Hash160 = 0xa9,
    Hash256 = 0xaa,
    CodeSeparator = 0xab,
    /// Verify a signature against the sighash
    CheckSig = 0xac,
    CheckSigVerify = 0xad,
    /// m-of-n signature check
    CheckMultiSig = 0xae,
    CheckMultiSigVerify = 0xaf,

    // Expansion
    Nop1 = 0xb0,
    CheckLockTimeVerify = 0xb1,
    CheckSequenceVerify = 0xb2,
    Nop4 = 0xb3,
    Nop5 = 0xb4,
    Nop6 = 0xb5,
    Nop7 = 0xb6,
    Nop8 = 0xb7,
    Nop9 = 0xb8,
    Nop10 = 0xb9,
}

impl OpCode {
    /// Convert byte to opcode
    pub fn from_byte(byte: u8) -> Option<Self> {
        let op = match byte {
            0x00 => OpCode::Zero,
            0x4c => OpCode::PushData1,
            0x4d => OpCode::PushData2,
            0x4e => OpCode::PushData4,
            0x4f => OpCode::Negate1,
            0x51 => OpCode::Num1,
            0x52 => OpCode::Num2,
            0x53 => OpCode::Num3,
            0x54 => OpCode::Num4,
            0x55 => OpCode::Num5,
            0x56 => OpCode::Num6,
            0x57 => OpCode::Num7,
            0x58 => OpCode::Num8,
            0x59 => OpCode::Num9,
            0x5a => OpCode::Num10,
            0x5b => OpCode::Num11,
            0x5c => OpCode::Num12,
            0x5d => OpCode::Num13,
            0x5e => OpCode::Num14,
            0x5f => OpCode::Num15,
            0x60 => OpCode::Num16,
            0x61 => OpCode::Nop,
            0x63 => OpCode::If,
            0x64 => OpCode::NotIf,
            0x67 => OpCode::Else,
            0x68 => OpCode::EndIf,
            0x69 => OpCode::Verify,
            0x6a => OpCode::Return,
            0x6b => OpCode::ToAltStack,
            0x6c => OpCode::FromAltStack,
            0x6d => OpCode::Drop2,
            0x6e => OpCode::Dup2,
            0x6f => OpCode::Dup3,
            0x70 => OpCode::Over2,
            0x71 => OpCode::Rot2,
            0x72 => OpCode::Swap2,
            0x73 => OpCode::IfDup,
            0x74 => OpCode::Depth,
            0x75 => OpCode::Drop,
            0x76 => OpCode::Dup,
            0x77 => OpCode::Nip,
            0x78 => OpCode::Over,
            0x79 => OpCode::Pick,
            0x7a => OpCode::Roll,
            0x7b => OpCode::Rot,
            0x7c => OpCode::Swap,
            0x7d => OpCode::Tuck,
            0x82 => OpCode::Size,
            0x87 => OpCode::Equal,
            0x88 => OpCode::EqualVerify,
            0x8b => OpCode::Add1,
            0x8c => OpCode::Sub1,
            0x8f => OpCode::Negate,
            0x90 => OpCode::Abs,
            0x91 => OpCode::Not,
            0x92 => OpCode::NotEqual0,
            0x93 => OpCode::Add,
            0x94 => OpCode::Sub,
            0x95 => OpCode::Mul,
            0x9a => OpCode::BoolAnd,
            0x9b => OpCode::BoolOr,
            0x9c => OpCode::NumEqual,
            0x9d => OpCode::NumEqualVerify,
            0x9e => OpCode::NumNotEqual,
            0x9f => OpCode::LessThan,
            0xa0 => OpCode::GreaterThan,
            0xa1 => OpCode::LessThanOrEqual,
            0xa2 => OpCode::GreaterThanOrEqual,
            0xa3 => OpCode::Min,
            0xa4 => OpCode::Max,
            0xa5 => OpCode::Within,
            0xa6 => OpCode::Ripemd160,
            0xa7 => OpCode::Sha1,
            0xa8 => OpCode::Sha256,
            0xa9 => OpCode::Hash160,
            0xaa => OpCode::Hash256,
            0xab => OpCode::CodeSeparator,
            0xac => OpCode::CheckSig,
            0xad => OpCode::CheckSigVerify,
            0xae => OpCode::CheckMultiSig,
            0xaf => OpCode::CheckMultiSigVerify,
            0xb0 => OpCode::Nop1,
            0xb1 => OpCode::CheckLockTimeVerify,
            0xb2 => OpCode::CheckSequenceVerify,
            0xb3 => OpCode::Nop4,
            0xb4 => OpCode::Nop5,
            0xb5 => OpCode::Nop6,
            0xb6 => OpCode::Nop7,
            0xb7 => OpCode::Nop8,
            0xb8 => OpCode::Nop9,
            0xb9 => OpCode::Nop10,
            _ => return None,
        };
        Some(op)
    }

    /// Convert opcode to byte
    pub const fn to_byte(self) -> u8 {
        self as u8
    }

    /// Script-assembly name
    pub fn name(&self) -> &'static str {
        match self {
            OpCode::Zero => "OP_0",
            OpCode::PushData1 => "OP_PUSHDATA1",
            OpCode::PushData2 => "OP_PUSHDATA2",
            OpCode::PushData4 => "OP_PUSHDATA4",
            OpCode::Negate1 => "OP_1NEGATE",
            OpCode::Num1 => "OP_1",
            OpCode::Num2 => "OP_2",
            OpCode::Num3 => "OP_3",
            OpCode::Num4 => "OP_4",
            OpCode::Num5 => "OP_5",
            OpCode::Num6 => "OP_6",
            OpCode::Num7 => "OP_7",
            OpCode::Num8 => "OP_8",
            OpCode::Num9 => "OP_9",
            OpCode::Num10 => "OP_10",
            OpCode::Num11 => "OP_11",
            OpCode::Num12 => "OP_12",
            OpCode::Num13 => "OP_13",
            OpCode::Num14 => "OP_14",
            OpCode::Num15 => "OP_15",
            OpCode::Num16 => "OP_16",
            OpCode::Nop => "OP_NOP",
            OpCode::If => "OP_IF",
            OpCode::NotIf => "OP_NOTIF",
            OpCode::Else => "OP_ELSE",
            OpCode::EndIf => "OP_ENDIF",
            OpCode::Verify => "OP_VERIFY",
            OpCode::Return => "OP_RETURN",
            OpCode::ToAltStack => "OP_TOALTSTACK",
            OpCode::FromAltStack => "OP_FROMALTSTACK",
            OpCode::Drop2 => "OP_2DROP",
            OpCode::Dup2 => "OP_2DUP",
            OpCode::Dup3 => "OP_3DUP",
            OpCode::Over2 => "OP_2OVER",
            OpCode::Rot2 => "OP_2ROT",
            OpCode::Swap2 => "OP_2SWAP",
            OpCode::IfDup => "OP_IFDUP",
            OpCode::Depth => "OP_DEPTH",
            OpCode::Drop => "OP_DROP",
            OpCode::Dup => "OP_DUP",
            OpCode::Nip => "OP_NIP",
            OpCode::Over => "OP_OVER",
            OpCode::Pick => "OP_PICK",
            OpCode::Roll => "OP_ROLL",
            OpCode::Rot => "OP_ROT",
            OpCode::Swap => "OP_SWAP",
            OpCode::Tuck => "OP_TUCK",
            OpCode::Size => "OP_SIZE",
            OpCode::Equal => "OP_EQUAL",
            OpCode::EqualVerify => "OP_EQUALVERIFY",
            OpCode::Add1 => "OP_1ADD",
            OpCode::Sub1 => "OP_1SUB",
            OpCode::Negate => "OP_NEGATE",
            OpCode::Abs => "OP_ABS",
            OpCode::Not => "OP_NOT",
            OpCode::NotEqual0 => "OP_0NOTEQUAL",
            OpCode::Add => "OP_ADD",
            OpCode::Sub => "OP_SUB",
            OpCode::Mul => "OP_MUL",
            OpCode::BoolAnd => "OP_BOOLAND",
            OpCode::BoolOr => "OP_BOOLOR",
            OpCode::NumEqual => "OP_NUMEQUAL",
            OpCode::NumEqualVerify => "OP_NUMEQUALVERIFY",
            OpCode::NumNotEqual => "OP_NUMNOTEQUAL",
            OpCode::LessThan => "OP_LESSTHAN",
            OpCode::GreaterThan => "OP_GREATERTHAN",
            OpCode::LessThanOrEqual => "OP_LESSTHANOREQUAL",
            OpCode::GreaterThanOrEqual => "OP_GREATERTHANOREQUAL",
            OpCode::Min => "OP_MIN",
            OpCode::Max => "OP_MAX",
            OpCode::Within => "OP_WITHIN",
            OpCode::Ripemd160 => "OP_RIPEMD160",
            OpCode::Sha1 => "OP_SHA1",
            OpCode::Sha256 => "OP_SHA256",
            OpCode::Hash160 => "OP_HASH160",
            OpCode::Hash256 => "OP_HASH256",
            OpCode::CodeSeparator => "OP_CODESEPARATOR",
            OpCode::CheckSig => "OP_CHECKSIG",
            OpCode::CheckSigVerify => "OP_CHECKSIGVERIFY",
            OpCode::CheckMultiSig => "OP_CHECKMULTISIG",
            OpCode::CheckMultiSigVerify => "OP_CHECKMULTISIGVERIFY",
            OpCode::Nop1 => "OP_NOP1",
            OpCode::CheckLockTimeVerify => "OP_CHECKLOCKTIMEVERIFY",
            OpCode::CheckSequenceVerify => "OP_CHECKSEQUENCEVERIFY",
            OpCode::Nop4 => "OP_NOP4",
            OpCode::Nop5 => "OP_NOP5",
            OpCode::Nop6 => "OP_NOP6",
            OpCode::Nop7 => "OP_NOP7",
            OpCode::Nop8 => "OP_NOP8",
            OpCode::Nop9 => "OP_NOP9",
            OpCode::Nop10 => "OP_NOP10",
        }
    }

    /// Value pushed by OP_1NEGATE and OP_1..OP_16
    pub fn small_int(&self) -> Option<i64> {
        match self {
            OpCode::Negate1 => Some(-1),
            op if (0x51..=0x60).contains(&op.to_byte()) => Some(op.to_byte() as i64 - 0x50),
            _ => None,
        }
    }

    /// Opcodes this interpreter will not execute. Conditionals and the alt
    /// stack change control flow; the rest need transaction context that is
    /// not modelled here, or carry inline operands that only the parser may
    /// consume.
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self,
            OpCode::If
                | OpCode::NotIf
                | OpCode::Else
                | OpCode::EndIf
                | OpCode::ToAltStack
                | OpCode::FromAltStack
                | OpCode::Sha1
                | OpCode::CodeSeparator
                | OpCode::CheckLockTimeVerify
                | OpCode::CheckSequenceVerify
                | OpCode::PushData1
                | OpCode::PushData2
                | OpCode::PushData4
        )
    }

    /// Whether this opcode needs the signature hash
    pub fn needs_sighash(&self) -> bool {
        matches!(
            self,
            OpCode::CheckSig
                | OpCode::CheckSigVerify
                | OpCode::CheckMultiSig
                | OpCode::CheckMultiSigVerify
        )
    }
}

/// Assembly name for any byte, `OP_[n]` for bytes outside the table
pub fn opcode_name(byte: u8) -> String {
    match OpCode::from_byte(byte) {
        Some(op) => op.name().to_string(),
        None => format!("OP_[{}]", byte),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_roundtrip() {
        for byte in 0..=u8::MAX {
            if let Some(op) = OpCode::from_byte(byte) {
                assert_eq!(op.to_byte(), byte);
            }
        }
        assert_eq!(OpCode::from_byte(0x76), Some(OpCode::Dup));
        assert_eq!(OpCode::from_byte(0x50), None);
        assert_eq!(OpCode::from_byte(0x14), None);
    }

    #[test]
    fn test_names() {
        assert_eq!(OpCode::Hash160.name(), "OP_HASH160");
        assert_eq!(OpCode::Num16.name(), "OP_16");
        assert_eq!(OpCode::Nop10.name(), "OP_NOP10");
        assert_eq!(opcode_name(0xba), "OP_[186]");
    }

    #[test]
    fn test_small_int() {
        assert_eq!(OpCode::Negate1.small_int(), Some(-1));
        assert_eq!(OpCode::Num1.small_int(), Some(1));
        assert_eq!(OpCode::Num16.small_int(), Some(16));
        assert_eq!(OpCode::Zero.small_int(), None);
        assert_eq!(OpCode::Dup.small_int(), None);
    }

    #[test]
    fn test_unsupported() {
        for byte in [0x63, 0x64, 0x67, 0x68, 0x6b, 0x6c, 0xa7, 0xab, 0xb1, 0xb2] {
            let op = OpCode::from_byte(byte).unwrap();
            assert!(op.is_unsupported(), "{} should be unsupported", op.name());
        }
        assert!(!OpCode::CheckSig.is_unsupported());
        assert!(OpCode::CheckMultiSig.needs_sighash());
    }
}
