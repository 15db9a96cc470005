//! Just enough PDF reading to check what the composer wrote.

use std::collections::HashMap;

fn find(hay: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    hay.get(from..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

/// Raw stream payloads in file order.
pub fn streams(pdf: &[u8]) -> Vec<&[u8]> {
    let mut out = Vec::new();
    let mut pos = 0;
    while let Some(start) = find(pdf, b"\nstream\n", pos) {
        let data = start + b"\nstream\n".len();
        let Some(end) = find(pdf, b"\nendstream", data) else {
            break;
        };
        out.push(&pdf[data..end]);
        pos = end;
    }
    out
}

/// `/Count` of the page tree.
pub fn page_count(pdf: &[u8]) -> Option<usize> {
    let at = find(pdf, b"/Count ", 0)? + b"/Count ".len();
    let digits: String = pdf[at..]
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .map(|&b| b as char)
        .collect();
    digits.parse().ok()
}

/// Object numbers listed in the page tree's `/Kids`, in order.
pub fn kids(pdf: &[u8]) -> Vec<i32> {
    let Some(start) = find(pdf, b"/Kids [", 0) else {
        return Vec::new();
    };
    let start = start + b"/Kids [".len();
    let Some(end) = find(pdf, b"]", start) else {
        return Vec::new();
    };
    let body = String::from_utf8_lossy(&pdf[start..end]).into_owned();
    let tokens: Vec<&str> = body.split_whitespace().collect();
    tokens
        .chunks(3)
        .filter_map(|t| t.first()?.parse().ok())
        .collect()
}

/// Byte offset of indirect object `id`.
pub fn object_offset(pdf: &[u8], id: i32) -> Option<usize> {
    let marker = format!("{id} 0 obj\n");
    let mut from = 0;
    while let Some(at) = find(pdf, marker.as_bytes(), from) {
        if at == 0 || pdf[at - 1] == b'\n' {
            return Some(at);
        }
        from = at + 1;
    }
    None
}

/// Whether the object starting at `offset` is a page dictionary.
pub fn is_page_object(pdf: &[u8], offset: usize) -> bool {
    let end = find(pdf, b"endobj", offset).unwrap_or(pdf.len());
    let body = &pdf[offset..end];
    body.windows(b"/Type /Page".len())
        .enumerate()
        .any(|(i, w)| w == b"/Type /Page" && body.get(i + w.len()) != Some(&b's'))
}

/// Number of `/Type /Page` dictionaries, excluding the `/Pages` node.
pub fn page_dicts(pdf: &[u8]) -> usize {
    pdf.windows(b"/Type /Page".len())
        .enumerate()
        .filter(|(i, w)| *w == b"/Type /Page" && pdf.get(i + w.len()) != Some(&b's'))
        .count()
}

/// Glyph id to text, read from the ToUnicode CMap.
pub fn to_unicode(pdf: &[u8]) -> HashMap<u16, String> {
    let mut map = HashMap::new();
    for data in streams(pdf) {
        let text = String::from_utf8_lossy(data);
        if !text.contains("beginbfchar") {
            continue;
        }
        for line in text.lines() {
            let parts: Vec<&str> = line
                .split(|c| c == '<' || c == '>' || c == ' ')
                .filter(|s| !s.is_empty())
                .collect();
            let [src, dst] = parts.as_slice() else {
                continue;
            };
            let (Ok(gid), true) = (u16::from_str_radix(src, 16), dst.len() % 4 == 0) else {
                continue;
            };
            let units: Vec<u16> = (0..dst.len())
                .step_by(4)
                .filter_map(|i| u16::from_str_radix(&dst[i..i + 4], 16).ok())
                .collect();
            map.insert(gid, String::from_utf16_lossy(&units));
        }
    }
    map
}

/// Text shown on each page, one entry per `Tj`, pages in file order.
pub fn page_texts(pdf: &[u8]) -> Vec<Vec<String>> {
    let cmap = to_unicode(pdf);
    streams(pdf)
        .into_iter()
        .filter_map(|data| miniz_oxide::inflate::decompress_to_vec_zlib(data).ok())
        .filter(|raw| raw.windows(b"/Im1 Do".len()).any(|w| w == b"/Im1 Do"))
        .map(|raw| {
            raw.split(|&b| b == b'\n')
                .filter_map(|line| line.strip_suffix(b" Tj"))
                .map(|operand| {
                    decode_string(operand)
                        .chunks(2)
                        .filter(|pair| pair.len() == 2)
                        .map(|pair| {
                            let gid = u16::from_be_bytes([pair[0], pair[1]]);
                            cmap.get(&gid).cloned().unwrap_or_else(|| "\u{FFFD}".into())
                        })
                        .collect::<String>()
                })
                .collect::<Vec<String>>()
        })
        .collect()
}

fn decode_string(operand: &[u8]) -> Vec<u8> {
    match operand.first() {
        Some(b'<') => {
            let hex = String::from_utf8_lossy(&operand[1..operand.len() - 1]).into_owned();
            (0..hex.len())
                .step_by(2)
                .filter_map(|i| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok())
                .collect()
        }
        Some(b'(') => {
            let body = &operand[1..operand.len() - 1];
            let mut out = Vec::with_capacity(body.len());
            let mut i = 0;
            while i < body.len() {
                let b = body[i];
                i += 1;
                if b != b'\\' {
                    out.push(b);
                    continue;
                }
                let Some(&esc) = body.get(i) else { break };
                i += 1;
                match esc {
                    b'n' => out.push(b'\n'),
                    b'r' => out.push(b'\r'),
                    b't' => out.push(b'\t'),
                    b'b' => out.push(0x08),
                    b'f' => out.push(0x0c),
                    b'0'..=b'7' => {
                        let mut value = (esc - b'0') as u32;
                        for _ in 0..2 {
                            match body.get(i) {
                                Some(d @ b'0'..=b'7') => {
                                    value = value * 8 + (d - b'0') as u32;
                                    i += 1;
                                }
                                _ => break,
                            }
                        }
                        out.push(value as u8);
                    }
                    other => out.push(other),
                }
            }
            out
        }
        _ => Vec::new(),
    }
}
