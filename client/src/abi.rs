/// Fixed-function ABI codec for the voting contract
///
/// The contract interface is small and frozen (`getCandidates()`,
/// `hasVoted(address)`, `vote(uint256)`), so calldata and return data are
/// encoded and decoded directly instead of going through a generated binding.
/// Encoders for the return shapes are kept as the codec's inverse and back the
/// scripted wallet used in tests.
use sha3::{Digest, Keccak256};

use crate::errors::{VoteError, VoteResult};

const WORD: usize = 32;
// The contract holds a handful of candidates; anything larger is a decode error.
const MAX_CANDIDATES: usize = 4096;
const MAX_NAME_BYTES: usize = 4096;

/// First four bytes of the keccak-256 hash of a function signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let digest = Keccak256::digest(signature.as_bytes());
    let mut out = [0u8; 4];
    out.copy_from_slice(&digest[..4]);
    out
}

/// Calldata for `vote(uint256 candidateId)`.
pub fn vote_calldata(candidate_id: u64) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + WORD);
    data.extend_from_slice(&selector("vote(uint256)"));
    data.extend_from_slice(&u64_word(candidate_id));
    data
}

/// Calldata for `hasVoted(address voter)`.
pub fn has_voted_calldata(address: &str) -> VoteResult<Vec<u8>> {
    let raw = address.strip_prefix("0x").unwrap_or(address);
    let bytes =
        hex::decode(raw).map_err(|e| VoteError::Codec(format!("invalid address hex: {}", e)))?;
    if bytes.len() != 20 {
        return Err(VoteError::Codec(format!(
            "address must be 20 bytes, got {}",
            bytes.len()
        )));
    }
    let mut data = Vec::with_capacity(4 + WORD);
    data.extend_from_slice(&selector("hasVoted(address)"));
    data.extend_from_slice(&[0u8; 12]);
    data.extend_from_slice(&bytes);
    Ok(data)
}

/// Calldata for `getCandidates()`.
pub fn get_candidates_calldata() -> Vec<u8> {
    selector("getCandidates()").to_vec()
}

/// Decode a single `bool` return value.
pub fn decode_bool_return(data: &[u8]) -> VoteResult<bool> {
    let word = read_word(data, 0)?;
    Ok(word.iter().any(|b| *b != 0))
}

/// Decode the `(string name, uint256 voteCount)[]` return of `getCandidates()`.
pub fn decode_candidates_return(data: &[u8]) -> VoteResult<Vec<(String, u64)>> {
    let array_offset = word_to_usize(&read_word(data, 0)?)?;
    let count = word_to_usize(&read_word(data, array_offset)?)?;
    if count > MAX_CANDIDATES {
        return Err(VoteError::Codec(format!(
            "unreasonable candidate count {}",
            count
        )));
    }

    // Element offsets are relative to the first byte after the length word.
    let base = checked_add(array_offset, WORD)?;
    let mut candidates = Vec::with_capacity(count);
    for index in 0..count {
        let slot = checked_add(base, index * WORD)?;
        let element_offset = word_to_usize(&read_word(data, slot)?)?;
        let element_base = checked_add(base, element_offset)?;

        let name_offset = word_to_usize(&read_word(data, element_base)?)?;
        let vote_count = word_to_u64(&read_word(data, checked_add(element_base, WORD)?)?)?;

        let name_base = checked_add(element_base, name_offset)?;
        let name_len = word_to_usize(&read_word(data, name_base)?)?;
        if name_len > MAX_NAME_BYTES {
            return Err(VoteError::Codec(format!(
                "unreasonable candidate name length {}",
                name_len
            )));
        }
        let name_start = checked_add(name_base, WORD)?;
        let name_end = checked_add(name_start, name_len)?;
        let raw_name = data
            .get(name_start..name_end)
            .ok_or_else(|| VoteError::Codec("candidate name out of bounds".to_string()))?;
        let name = String::from_utf8(raw_name.to_vec())
            .map_err(|e| VoteError::Codec(format!("candidate name is not UTF-8: {}", e)))?;

        candidates.push((name, vote_count));
    }
    Ok(candidates)
}

/// Encode a `bool` return value.
pub fn encode_bool_return(value: bool) -> Vec<u8> {
    u64_word(u64::from(value)).to_vec()
}

/// Encode a `(string,uint256)[]` return value.
pub fn encode_candidates_return(candidates: &[(String, u64)]) -> Vec<u8> {
    let elements: Vec<Vec<u8>> = candidates
        .iter()
        .map(|(name, vote_count)| {
            // Tuple head: string offset (two words in), vote count. Tail: string.
            let mut element = Vec::new();
            element.extend_from_slice(&usize_word(2 * WORD));
            element.extend_from_slice(&u64_word(*vote_count));
            element.extend_from_slice(&usize_word(name.len()));
            element.extend_from_slice(name.as_bytes());
            let padded = pad_to_word(name.len());
            element.resize(3 * WORD + padded, 0);
            element
        })
        .collect();

    let mut data = Vec::new();
    data.extend_from_slice(&usize_word(WORD));
    data.extend_from_slice(&usize_word(candidates.len()));

    let mut offset = candidates.len() * WORD;
    for element in &elements {
        data.extend_from_slice(&usize_word(offset));
        offset += element.len();
    }
    for element in &elements {
        data.extend_from_slice(element);
    }
    data
}

fn u64_word(value: u64) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[WORD - 8..].copy_from_slice(&value.to_be_bytes());
    word
}

fn usize_word(value: usize) -> [u8; WORD] {
    u64_word(value as u64)
}

fn pad_to_word(len: usize) -> usize {
    (len + WORD - 1) / WORD * WORD
}

fn read_word(data: &[u8], position: usize) -> VoteResult<[u8; WORD]> {
    let slice = data
        .get(position..position + WORD)
        .ok_or_else(|| VoteError::Codec(format!("return data truncated at byte {}", position)))?;
    let mut word = [0u8; WORD];
    word.copy_from_slice(slice);
    Ok(word)
}

fn word_to_u64(word: &[u8; WORD]) -> VoteResult<u64> {
    if word[..WORD - 8].iter().any(|b| *b != 0) {
        return Err(VoteError::Codec("value exceeds u64 range".to_string()));
    }
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&word[WORD - 8..]);
    Ok(u64::from_be_bytes(bytes))
}

fn word_to_usize(word: &[u8; WORD]) -> VoteResult<usize> {
    let value = word_to_u64(word)?;
    usize::try_from(value).map_err(|_| VoteError::Codec("offset exceeds usize".to_string()))
}

fn checked_add(a: usize, b: usize) -> VoteResult<usize> {
    a.checked_add(b)
        .ok_or_else(|| VoteError::Codec("offset overflow in return data".to_string()))
}
