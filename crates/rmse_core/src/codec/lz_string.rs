//! Base64 flavour of the LZ-based string compression used by RPG Maker MV's
//! `StorageManager` (lz-string 1.4).
//!
//! The scheme works on UTF-16 code units, so text is converted with
//! [`str::encode_utf16`] on the way in and [`String::from_utf16`] on the way out.

use std::collections::{HashMap, HashSet};

const KEY_STR_BASE64: &[u8; 65] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/=";

const BASE64_BITS_PER_CHAR: u32 = 6;
const BASE64_RESET_VALUE: u32 = 32;

pub fn compress_to_base64(input: &str) -> String {
    let units: Vec<u16> = input.encode_utf16().collect();
    let mut out = Compressor::new(BASE64_BITS_PER_CHAR).compress(&units);
    match out.len() % 4 {
        1 => out.push_str("==="),
        2 => out.push_str("=="),
        3 => out.push('='),
        _ => {}
    }
    out
}

/// Returns `None` when the input is empty, contains characters outside the
/// base64 alphabet, is truncated, or does not decode to valid UTF-16.
pub fn decompress_from_base64(input: &str) -> Option<String> {
    let input = input.trim_end();
    if input.is_empty() {
        return None;
    }

    let values = input
        .bytes()
        .map(base64_value)
        .collect::<Option<Vec<u32>>>()?;
    let units = decompress(values.len(), BASE64_RESET_VALUE, |index| {
        values.get(index).copied().unwrap_or(0)
    })?;
    String::from_utf16(&units).ok()
}

fn base64_value(byte: u8) -> Option<u32> {
    KEY_STR_BASE64
        .iter()
        .position(|&b| b == byte)
        .map(|index| index as u32)
}

fn base64_char(value: u32) -> char {
    KEY_STR_BASE64[value as usize] as char
}

struct BitWriter {
    bits_per_char: u32,
    value: u32,
    position: u32,
    out: String,
}

impl BitWriter {
    fn new(bits_per_char: u32) -> Self {
        Self {
            bits_per_char,
            value: 0,
            position: 0,
            out: String::new(),
        }
    }

    /// Emits the low `count` bits of `bits`, least significant first.
    fn write(&mut self, count: u32, mut bits: u32) {
        for _ in 0..count {
            self.value = (self.value << 1) | (bits & 1);
            if self.position == self.bits_per_char - 1 {
                self.position = 0;
                self.out.push(base64_char(self.value));
                self.value = 0;
            } else {
                self.position += 1;
            }
            bits >>= 1;
        }
    }

    fn finish(mut self) -> String {
        loop {
            self.value <<= 1;
            if self.position == self.bits_per_char - 1 {
                self.out.push(base64_char(self.value));
                break;
            }
            self.position += 1;
        }
        self.out
    }
}

struct Compressor {
    dictionary: HashMap<Vec<u16>, u32>,
    pending_literals: HashSet<u16>,
    dict_size: u32,
    enlarge_in: u32,
    num_bits: u32,
    writer: BitWriter,
}

impl Compressor {
    fn new(bits_per_char: u32) -> Self {
        Self {
            dictionary: HashMap::new(),
            pending_literals: HashSet::new(),
            dict_size: 3,
            enlarge_in: 2,
            num_bits: 2,
            writer: BitWriter::new(bits_per_char),
        }
    }

    fn compress(mut self, input: &[u16]) -> String {
        let mut w: Vec<u16> = Vec::new();

        for &c in input {
            if !self.dictionary.contains_key([c].as_slice()) {
                self.dictionary.insert(vec![c], self.dict_size);
                self.dict_size += 1;
                self.pending_literals.insert(c);
            }

            let mut wc = w.clone();
            wc.push(c);
            if self.dictionary.contains_key(&wc) {
                w = wc;
                continue;
            }

            self.emit(&w);
            self.shrink_window();
            self.dictionary.insert(wc, self.dict_size);
            self.dict_size += 1;
            w = vec![c];
        }

        if !w.is_empty() {
            self.emit(&w);
            self.shrink_window();
        }

        // End of stream marker.
        self.writer.write(self.num_bits, 2);
        self.writer.finish()
    }

    fn emit(&mut self, w: &[u16]) {
        if let [literal] = w
            && self.pending_literals.remove(literal)
        {
            let literal = u32::from(*literal);
            if literal < 256 {
                self.writer.write(self.num_bits, 0);
                self.writer.write(8, literal);
            } else {
                self.writer.write(self.num_bits, 1);
                self.writer.write(16, literal);
            }
            self.shrink_window();
            return;
        }

        let code = self.dictionary.get(w).copied().unwrap_or_default();
        self.writer.write(self.num_bits, code);
    }

    fn shrink_window(&mut self) {
        self.enlarge_in -= 1;
        if self.enlarge_in == 0 {
            self.enlarge_in = 1 << self.num_bits;
            self.num_bits += 1;
        }
    }
}

struct BitReader<F> {
    next_value: F,
    reset_value: u32,
    value: u32,
    position: u32,
    index: usize,
}

impl<F: Fn(usize) -> u32> BitReader<F> {
    fn new(reset_value: u32, next_value: F) -> Self {
        let value = next_value(0);
        Self {
            next_value,
            reset_value,
            value,
            position: reset_value,
            index: 1,
        }
    }

    fn read(&mut self, count: u32) -> u32 {
        let mut bits = 0;
        for shift in 0..count {
            let set = self.value & self.position;
            self.position >>= 1;
            if self.position == 0 {
                self.position = self.reset_value;
                self.value = (self.next_value)(self.index);
                self.index += 1;
            }
            if set > 0 {
                bits |= 1 << shift;
            }
        }
        bits
    }
}

fn decompress(length: usize, reset_value: u32, next_value: impl Fn(usize) -> u32) -> Option<Vec<u16>> {
    // Codes 0..=2 are control codes; real entries start at 3.
    let mut dictionary: Vec<Vec<u16>> = vec![Vec::new(); 3];
    let mut enlarge_in: u32 = 4;
    let mut num_bits: u32 = 3;
    let mut reader = BitReader::new(reset_value, next_value);

    let first = match reader.read(2) {
        0 => reader.read(8) as u16,
        1 => reader.read(16) as u16,
        2 => return Some(Vec::new()),
        _ => return None,
    };
    dictionary.push(vec![first]);
    let mut w = vec![first];
    let mut result = vec![first];

    loop {
        if reader.index > length {
            return None;
        }

        let code = match reader.read(num_bits) {
            0 => {
                let literal = reader.read(8) as u16;
                dictionary.push(vec![literal]);
                enlarge_in -= 1;
                dictionary.len() - 1
            }
            1 => {
                let literal = reader.read(16) as u16;
                dictionary.push(vec![literal]);
                enlarge_in -= 1;
                dictionary.len() - 1
            }
            2 => return Some(result),
            code => code as usize,
        };

        if enlarge_in == 0 {
            enlarge_in = 1 << num_bits;
            num_bits += 1;
        }

        let entry = if code >= 3 && code < dictionary.len() {
            dictionary[code].clone()
        } else if code == dictionary.len() {
            let mut entry = w.clone();
            entry.push(w[0]);
            entry
        } else {
            return None;
        };

        result.extend_from_slice(&entry);
        let mut added = w;
        added.push(entry[0]);
        dictionary.push(added);
        enlarge_in -= 1;
        w = entry;

        if enlarge_in == 0 {
            enlarge_in = 1 << num_bits;
            num_bits += 1;
        }
    }
}
