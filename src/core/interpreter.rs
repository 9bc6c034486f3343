//! Script interpreter
//!
//! The operand stack, script number encoding and one handler per opcode.
//! `Script::execute` feeds commands through `run_opcode`; any handler error
//! aborts the whole evaluation.

use num_bigint::BigUint;

use super::opcodes::OpCode;
use super::script::ScriptError;
use crate::crypto::hash::{hash160, hash256, ripemd160, sha256};
use crate::crypto::secp256k1::S256Point;
use crate::crypto::signature::Signature;

// =============================================================================
// Limits
// =============================================================================

/// Largest data push allowed at execution time
pub const MAX_ELEMENT_SIZE: usize = 520;

/// Arithmetic operands are at most this many bytes
pub const MAX_NUM_SIZE: usize = 4;

// =============================================================================
// Script numbers
// =============================================================================

/// Encode an integer as a minimal little-endian sign-magnitude byte string
pub fn encode_num(num: i64) -> Vec<u8> {
    if num == 0 {
        return Vec::new();
    }

    let negative = num < 0;
    let mut magnitude = num.unsigned_abs();
    let mut result = Vec::new();
    while magnitude > 0 {
        result.push((magnitude & 0xff) as u8);
        magnitude >>= 8;
    }

    let last = result.len() - 1;
    if result[last] & 0x80 != 0 {
        result.push(if negative { 0x80 } else { 0x00 });
    } else if negative {
        result[last] |= 0x80;
    }
    result
}

/// Decode a script number of at most four bytes
pub fn decode_num(bytes: &[u8]) -> Result<i64, ScriptError> {
    if bytes.len() > MAX_NUM_SIZE {
        return Err(ScriptError::NumberTooLong(bytes.len()));
    }
    let Some(&last) = bytes.last() else {
        return Ok(0);
    };

    let mut result = bytes
        .iter()
        .enumerate()
        .fold(0i64, |acc, (i, &b)| acc | ((b as i64) << (8 * i)));

    if last & 0x80 != 0 {
        result &= !(0x80i64 << (8 * (bytes.len() - 1)));
        Ok(-result)
    } else {
        Ok(result)
    }
}

/// False for any encoding of zero, including negative zero
pub fn is_truthy(item: &[u8]) -> bool {
    for (i, &byte) in item.iter().enumerate() {
        if byte != 0 {
            return !(i == item.len() - 1 && byte == 0x80);
        }
    }
    false
}

// =============================================================================
// Operand stack
// =============================================================================

/// The main stack of a single script evaluation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpStack {
    items: Vec<Vec<u8>>,
}

impl OpStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items bottom first
    pub fn items(&self) -> &[Vec<u8>] {
        &self.items
    }

    pub fn top(&self) -> Option<&[u8]> {
        self.items.last().map(Vec::as_slice)
    }

    pub fn push(&mut self, item: Vec<u8>) {
        self.items.push(item);
    }

    pub fn push_num(&mut self, num: i64) {
        self.items.push(encode_num(num));
    }

    pub fn push_bool(&mut self, value: bool) {
        self.push_num(value as i64);
    }

    /// Fail with StackUnderflow unless at least `needed` items are present
    pub fn require(&self, op: OpCode, needed: usize) -> Result<(), ScriptError> {
        if self.items.len() < needed {
            return Err(ScriptError::StackUnderflow {
                op: op.name(),
                needed,
                available: self.items.len(),
            });
        }
        Ok(())
    }

    pub fn pop(&mut self) -> Result<Vec<u8>, ScriptError> {
        self.items.pop().ok_or(ScriptError::StackUnderflow {
            op: "pop",
            needed: 1,
            available: 0,
        })
    }

    pub fn pop_num(&mut self) -> Result<i64, ScriptError> {
        decode_num(&self.pop()?)
    }

    /// Item `depth` positions below the top (0 is the top)
    fn peek(&self, depth: usize) -> Result<&Vec<u8>, ScriptError> {
        self.items
            .len()
            .checked_sub(depth + 1)
            .map(|i| &self.items[i])
            .ok_or(ScriptError::InvalidStackIndex(depth as i64))
    }

    /// Remove the item `depth` positions below the top
    fn remove(&mut self, depth: usize) -> Result<Vec<u8>, ScriptError> {
        let index = self
            .items
            .len()
            .checked_sub(depth + 1)
            .ok_or(ScriptError::InvalidStackIndex(depth as i64))?;
        Ok(self.items.remove(index))
    }
}

// =============================================================================
// Dispatch
// =============================================================================

/// Run one opcode against the stack; `z` is the signature hash
pub fn run_opcode(op: OpCode, stack: &mut OpStack, z: &[u8; 32]) -> Result<(), ScriptError> {
    if op.is_unsupported() {
        return Err(ScriptError::UnsupportedOpcode(op.name()));
    }

    match op {
        OpCode::Zero => {
            stack.push(Vec::new());
            Ok(())
        }
        OpCode::Negate1
        | OpCode::Num1
        | OpCode::Num2
        | OpCode::Num3
        | OpCode::Num4
        | OpCode::Num5
        | OpCode::Num6
        | OpCode::Num7
        | OpCode::Num8
        | OpCode::Num9
        | OpCode::Num10
        | OpCode::Num11
        | OpCode::Num12
        | OpCode::Num13
        | OpCode::Num14
        | OpCode::Num15
        | OpCode::Num16 => {
            stack.push_num(op.small_int().unwrap_or_default());
            Ok(())
        }
        OpCode::Nop
        | OpCode::Nop1
        | OpCode::Nop4
        | OpCode::Nop5
        | OpCode::Nop6
        | OpCode::Nop7
        | OpCode::Nop8
        | OpCode::Nop9
        | OpCode::Nop10 => Ok(()),
        OpCode::Verify => op_verify(stack, op),
        OpCode::Return => Err(ScriptError::OpReturn),

        OpCode::Drop2 => op_2drop(stack),
        OpCode::Dup2 => op_2dup(stack),
        OpCode::Dup3 => op_3dup(stack),
        OpCode::Over2 => op_2over(stack),
        OpCode::Rot2 => op_2rot(stack),
        OpCode::Swap2 => op_2swap(stack),
        OpCode::IfDup => op_ifdup(stack),
        OpCode::Depth => {
            stack.push_num(stack.len() as i64);
            Ok(())
        }
        OpCode::Drop => op_drop(stack),
        OpCode::Dup => op_dup(stack),
        OpCode::Nip => op_nip(stack),
        OpCode::Over => op_over(stack),
        OpCode::Pick => op_pick(stack, false),
        OpCode::Roll => op_pick(stack, true),
        OpCode::Rot => op_rot(stack),
        OpCode::Swap => op_swap(stack),
        OpCode::Tuck => op_tuck(stack),
        OpCode::Size => op_size(stack),

        OpCode::Equal => op_equal(stack),
        OpCode::EqualVerify => {
            op_equal(stack)?;
            op_verify(stack, op)
        }

        OpCode::Add1 => unary(stack, op, |n| n + 1),
        OpCode::Sub1 => unary(stack, op, |n| n - 1),
        OpCode::Negate => unary(stack, op, |n| -n),
        OpCode::Abs => unary(stack, op, i64::abs),
        OpCode::Not => unary(stack, op, |n| (n == 0) as i64),
        OpCode::NotEqual0 => unary(stack, op, |n| (n != 0) as i64),
        OpCode::Add => binary(stack, op, |a, b| a + b),
        OpCode::Sub => binary(stack, op, |a, b| a - b),
        OpCode::Mul => binary(stack, op, |a, b| a * b),
        OpCode::BoolAnd => binary(stack, op, |a, b| (a != 0 && b != 0) as i64),
        OpCode::BoolOr => binary(stack, op, |a, b| (a != 0 || b != 0) as i64),
        OpCode::NumEqual => binary(stack, op, |a, b| (a == b) as i64),
        OpCode::NumEqualVerify => {
            binary(stack, op, |a, b| (a == b) as i64)?;
            op_verify(stack, op)
        }
        OpCode::NumNotEqual => binary(stack, op, |a, b| (a != b) as i64),
        OpCode::LessThan => binary(stack, op, |a, b| (a < b) as i64),
        OpCode::GreaterThan => binary(stack, op, |a, b| (a > b) as i64),
        OpCode::LessThanOrEqual => binary(stack, op, |a, b| (a <= b) as i64),
        OpCode::GreaterThanOrEqual => binary(stack, op, |a, b| (a >= b) as i64),
        OpCode::Min => binary(stack, op, i64::min),
        OpCode::Max => binary(stack, op, i64::max),
        OpCode::Within => op_within(stack),

        OpCode::Ripemd160 => hash_top(stack, op, |data| ripemd160(data).to_vec()),
        OpCode::Sha256 => hash_top(stack, op, |data| sha256(data).to_vec()),
        OpCode::Hash160 => hash_top(stack, op, |data| hash160(data).to_vec()),
        OpCode::Hash256 => hash_top(stack, op, |data| hash256(data).to_vec()),

        OpCode::CheckSig => op_checksig(stack, op, z),
        OpCode::CheckSigVerify => {
            op_checksig(stack, op, z)?;
            op_verify(stack, op)
        }
        OpCode::CheckMultiSig => op_checkmultisig(stack, op, z),
        OpCode::CheckMultiSigVerify => {
            op_checkmultisig(stack, op, z)?;
            op_verify(stack, op)
        }

        // Covered by is_unsupported above
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
        | OpCode::PushData4 => Err(ScriptError::UnsupportedOpcode(op.name())),
    }
}

// =============================================================================
// Handlers
// =============================================================================

fn op_verify(stack: &mut OpStack, op: OpCode) -> Result<(), ScriptError> {
    stack.require(op, 1)?;
    if !is_truthy(&stack.pop()?) {
        return Err(ScriptError::VerifyFailed(op.name()));
    }
    Ok(())
}

fn op_2drop(stack: &mut OpStack) -> Result<(), ScriptError> {
    stack.require(OpCode::Drop2, 2)?;
    stack.pop()?;
    stack.pop()?;
    Ok(())
}

fn op_2dup(stack: &mut OpStack) -> Result<(), ScriptError> {
    stack.require(OpCode::Dup2, 2)?;
    let a = stack.peek(1)?.clone();
    let b = stack.peek(0)?.clone();
    stack.push(a);
    stack.push(b);
    Ok(())
}

fn op_3dup(stack: &mut OpStack) -> Result<(), ScriptError> {
    stack.require(OpCode::Dup3, 3)?;
    for _ in 0..3 {
        let item = stack.peek(2)?.clone();
        stack.push(item);
    }
    Ok(())
}

fn op_2over(stack: &mut OpStack) -> Result<(), ScriptError> {
    stack.require(OpCode::Over2, 4)?;
    for _ in 0..2 {
        let item = stack.peek(3)?.clone();
        stack.push(item);
    }
    Ok(())
}

fn op_2rot(stack: &mut OpStack) -> Result<(), ScriptError> {
    stack.require(OpCode::Rot2, 6)?;
    let first = stack.remove(5)?;
    let second = stack.remove(4)?;
    stack.push(first);
    stack.push(second);
    Ok(())
}

fn op_2swap(stack: &mut OpStack) -> Result<(), ScriptError> {
    stack.require(OpCode::Swap2, 4)?;
    let len = stack.items.len();
    stack.items[len - 4..].rotate_left(2);
    Ok(())
}

fn op_ifdup(stack: &mut OpStack) -> Result<(), ScriptError> {
    stack.require(OpCode::IfDup, 1)?;
    let top = stack.peek(0)?.clone();
    if is_truthy(&top) {
        stack.push(top);
    }
    Ok(())
}

fn op_drop(stack: &mut OpStack) -> Result<(), ScriptError> {
    stack.require(OpCode::Drop, 1)?;
    stack.pop()?;
    Ok(())
}

fn op_dup(stack: &mut OpStack) -> Result<(), ScriptError> {
    stack.require(OpCode::Dup, 1)?;
    let top = stack.peek(0)?.clone();
    stack.push(top);
    Ok(())
}

fn op_nip(stack: &mut OpStack) -> Result<(), ScriptError> {
    stack.require(OpCode::Nip, 2)?;
    stack.remove(1)?;
    Ok(())
}

fn op_over(stack: &mut OpStack) -> Result<(), ScriptError> {
    stack.require(OpCode::Over, 2)?;
    let item = stack.peek(1)?.clone();
    stack.push(item);
    Ok(())
}

/// OP_PICK copies the n-th item to the top; OP_ROLL moves it
fn op_pick(stack: &mut OpStack, roll: bool) -> Result<(), ScriptError> {
    let op = if roll { OpCode::Roll } else { OpCode::Pick };
    stack.require(op, 1)?;
    let n = stack.pop_num()?;
    let depth = usize::try_from(n).map_err(|_| ScriptError::InvalidStackIndex(n))?;
    stack.require(op, depth + 1)?;

    let item = if roll {
        stack.remove(depth)?
    } else {
        stack.peek(depth)?.clone()
    };
    stack.push(item);
    Ok(())
}

fn op_rot(stack: &mut OpStack) -> Result<(), ScriptError> {
    stack.require(OpCode::Rot, 3)?;
    let third = stack.remove(2)?;
    stack.push(third);
    Ok(())
}

fn op_swap(stack: &mut OpStack) -> Result<(), ScriptError> {
    stack.require(OpCode::Swap, 2)?;
    let len = stack.items.len();
    stack.items.swap(len - 1, len - 2);
    Ok(())
}

fn op_tuck(stack: &mut OpStack) -> Result<(), ScriptError> {
    stack.require(OpCode::Tuck, 2)?;
    let top = stack.peek(0)?.clone();
    let len = stack.items.len();
    stack.items.insert(len - 2, top);
    Ok(())
}

fn op_size(stack: &mut OpStack) -> Result<(), ScriptError> {
    stack.require(OpCode::Size, 1)?;
    let size = stack.peek(0)?.len();
    stack.push_num(size as i64);
    Ok(())
}

fn op_equal(stack: &mut OpStack) -> Result<(), ScriptError> {
    stack.require(OpCode::Equal, 2)?;
    let a = stack.pop()?;
    let b = stack.pop()?;
    stack.push_bool(a == b);
    Ok(())
}

fn unary(stack: &mut OpStack, op: OpCode, f: impl Fn(i64) -> i64) -> Result<(), ScriptError> {
    stack.require(op, 1)?;
    let n = stack.pop_num()?;
    stack.push_num(f(n));
    Ok(())
}

/// `f(a, b)` where `b` was on top of the stack
fn binary(
    stack: &mut OpStack,
    op: OpCode,
    f: impl Fn(i64, i64) -> i64,
) -> Result<(), ScriptError> {
    stack.require(op, 2)?;
    let b = stack.pop_num()?;
    let a = stack.pop_num()?;
    stack.push_num(f(a, b));
    Ok(())
}

fn op_within(stack: &mut OpStack) -> Result<(), ScriptError> {
    stack.require(OpCode::Within, 3)?;
    let max = stack.pop_num()?;
    let min = stack.pop_num()?;
    let x = stack.pop_num()?;
    stack.push_bool(min <= x && x < max);
    Ok(())
}

fn hash_top(
    stack: &mut OpStack,
    op: OpCode,
    f: impl Fn(&[u8]) -> Vec<u8>,
) -> Result<(), ScriptError> {
    stack.require(op, 1)?;
    let item = stack.pop()?;
    stack.push(f(&item));
    Ok(())
}

/// Parse a DER signature with its trailing sighash-type byte removed
fn parse_script_sig(mut der_with_type: Vec<u8>) -> Option<Signature> {
    der_with_type.pop()?;
    match Signature::parse(&der_with_type) {
        Ok(sig) => Some(sig),
        Err(e) => {
            log::debug!("Unparseable signature: {}", e);
            None
        }
    }
}

fn parse_pubkey(sec: &[u8]) -> Option<S256Point> {
    match S256Point::parse(sec) {
        Ok(point) => Some(point),
        Err(e) => {
            log::debug!("Unparseable public key: {}", e);
            None
        }
    }
}

fn op_checksig(stack: &mut OpStack, op: OpCode, z: &[u8; 32]) -> Result<(), ScriptError> {
    stack.require(op, 2)?;
    let sec = stack.pop()?;
    let der = stack.pop()?;

    let valid = match (parse_pubkey(&sec), parse_script_sig(der)) {
        (Some(point), Some(sig)) => point.verify(&BigUint::from_bytes_be(z), &sig),
        _ => false,
    };
    if !valid {
        log::debug!("{}: signature does not verify", op.name());
    }
    stack.push_bool(valid);
    Ok(())
}

fn op_checkmultisig(stack: &mut OpStack, op: OpCode, z: &[u8; 32]) -> Result<(), ScriptError> {
    stack.require(op, 1)?;

    let n = stack.pop_num()?;
    let n = usize::try_from(n).map_err(|_| ScriptError::InvalidKeyCount(n))?;
    stack.require(op, n + 1)?;
    let mut sec_pubkeys: Vec<Vec<u8>> = (0..n).map(|_| stack.pop()).collect::<Result<_, _>>()?;

    let m = stack.pop_num()?;
    let m = usize::try_from(m)
        .ok()
        .filter(|&m| m <= n)
        .ok_or(ScriptError::InvalidSignatureCount(m))?;
    stack.require(op, m + 1)?;
    let mut der_signatures: Vec<Vec<u8>> =
        (0..m).map(|_| stack.pop()).collect::<Result<_, _>>()?;

    // Consensus pops one item more than it uses
    stack.pop()?;

    // Back into script order
    sec_pubkeys.reverse();
    der_signatures.reverse();

    let z = BigUint::from_bytes_be(z);
    let mut points = sec_pubkeys.iter().map(|sec| parse_pubkey(sec));
    let mut all_matched = true;
    for der in der_signatures {
        let Some(sig) = parse_script_sig(der) else {
            all_matched = false;
            break;
        };
        let matched = points.any(|point| point.is_some_and(|p| p.verify(&z, &sig)));
        if !matched {
            all_matched = false;
            break;
        }
    }

    if !all_matched {
        log::debug!("{}: signatures do not match keys in order", op.name());
    }
    stack.push_bool(all_matched);
    Ok(())
}
