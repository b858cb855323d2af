/// Minimal reader for the NPY arrays the renderer dumps with np.save.
///
/// Covers exactly what the sample dumps use: NPY format 1.0, C-order,
/// little-endian f8 or f4 payloads, 2D shape. Everything else is rejected.
use std::fmt;
use std::fs;
use std::path::Path;

#[derive(Debug)]
pub enum NpyError {
    Io(std::io::Error),
    BadMagic,
    UnsupportedVersion(u8, u8),
    BadHeader(String),
    UnsupportedDtype(String),
    FortranOrder,
    TruncatedData { expected: usize, actual: usize },
}

impl From<std::io::Error> for NpyError {
    fn from(err: std::io::Error) -> Self {
        NpyError::Io(err)
    }
}

impl fmt::Display for NpyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NpyError::Io(e) => write!(f, "IO error: {}", e),
            NpyError::BadMagic => write!(f, "not an NPY file (bad magic)"),
            NpyError::UnsupportedVersion(major, minor) => {
                write!(f, "unsupported NPY version {}.{}", major, minor)
            }
            NpyError::BadHeader(msg) => write!(f, "malformed NPY header: {}", msg),
            NpyError::UnsupportedDtype(d) => write!(f, "unsupported dtype {}", d),
            NpyError::FortranOrder => write!(f, "Fortran-ordered arrays are not supported"),
            NpyError::TruncatedData { expected, actual } => {
                write!(f, "truncated data: expected {} bytes, got {}", expected, actual)
            }
        }
    }
}

impl std::error::Error for NpyError {}

/// A 2D f64 array loaded from disk. f4 payloads are widened on load.
#[derive(Debug, Clone)]
pub struct NpyArray {
    pub rows: usize,
    pub cols: usize,
    data: Vec<f64>,
}

impl NpyArray {
    pub fn row(&self, index: usize) -> &[f64] {
        &self.data[index * self.cols..(index + 1) * self.cols]
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Build an array in memory, mostly for tests and synthetic buffers.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Self {
        let cols = rows.first().map_or(0, |r| r.len());
        let n = rows.len();
        let data = rows.into_iter().flatten().collect();
        Self { rows: n, cols, data }
    }
}

pub fn load(path: &Path) -> Result<NpyArray, NpyError> {
    parse(&fs::read(path)?)
}

pub fn parse(bytes: &[u8]) -> Result<NpyArray, NpyError> {
    const MAGIC: &[u8] = b"\x93NUMPY";
    if bytes.len() < 10 || &bytes[..6] != MAGIC {
        return Err(NpyError::BadMagic);
    }
    let (major, minor) = (bytes[6], bytes[7]);
    if major != 1 {
        return Err(NpyError::UnsupportedVersion(major, minor));
    }

    let header_len = u16::from_le_bytes([bytes[8], bytes[9]]) as usize;
    let header_end = 10 + header_len;
    if bytes.len() < header_end {
        return Err(NpyError::BadHeader("header extends past file end".into()));
    }
    let header = std::str::from_utf8(&bytes[10..header_end])
        .map_err(|_| NpyError::BadHeader("header is not ASCII".into()))?;

    let descr = dict_value(header, "descr")?;
    let item_size = match descr.as_str() {
        "<f8" | "|f8" => 8,
        "<f4" | "|f4" => 4,
        other => return Err(NpyError::UnsupportedDtype(other.to_string())),
    };

    if dict_value(header, "fortran_order")? == "True" {
        return Err(NpyError::FortranOrder);
    }

    let (rows, cols) = parse_shape(&dict_value(header, "shape")?)?;

    let payload = &bytes[header_end..];
    let expected = rows * cols * item_size;
    if payload.len() < expected {
        return Err(NpyError::TruncatedData {
            expected,
            actual: payload.len(),
        });
    }

    let mut data = Vec::with_capacity(rows * cols);
    for chunk in payload[..expected].chunks_exact(item_size) {
        let value = if item_size == 8 {
            f64::from_le_bytes(chunk.try_into().unwrap())
        } else {
            f32::from_le_bytes(chunk.try_into().unwrap()) as f64
        };
        data.push(value);
    }

    Ok(NpyArray { rows, cols, data })
}

/// Pull one value out of the header's python dict literal. The writer numpy
/// uses emits single-quoted keys in a fixed `{'k': v, …}` shape, so simple
/// string surgery is enough.
fn dict_value(header: &str, key: &str) -> Result<String, NpyError> {
    let marker = format!("'{}':", key);
    let start = header
        .find(&marker)
        .ok_or_else(|| NpyError::BadHeader(format!("missing key '{}'", key)))?
        + marker.len();
    let rest = header[start..].trim_start();

    let value = if let Some(tuple) = rest.strip_prefix('(') {
        let end = tuple
            .find(')')
            .ok_or_else(|| NpyError::BadHeader("unterminated shape tuple".into()))?;
        format!("({})", &tuple[..end])
    } else if let Some(quoted) = rest.strip_prefix('\'') {
        let end = quoted
            .find('\'')
            .ok_or_else(|| NpyError::BadHeader("unterminated string value".into()))?;
        quoted[..end].to_string()
    } else {
        rest.split(&[',', '}'][..])
            .next()
            .unwrap_or("")
            .trim()
            .to_string()
    };

    Ok(value)
}

fn parse_shape(shape: &str) -> Result<(usize, usize), NpyError> {
    let inner = shape
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| NpyError::BadHeader(format!("bad shape {}", shape)))?;

    let dims: Vec<usize> = inner
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<usize>()
                .map_err(|_| NpyError::BadHeader(format!("bad shape dimension {}", s)))
        })
        .collect::<Result<_, _>>()?;

    match dims.as_slice() {
        [rows, cols] => Ok((*rows, *cols)),
        other => Err(NpyError::BadHeader(format!(
            "expected a 2D array, shape has {} dimensions",
            other.len()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Assemble NPY 1.0 bytes the way np.save does.
    fn npy_bytes(descr: &str, shape: (usize, usize), payload: &[u8]) -> Vec<u8> {
        let mut header = format!(
            "{{'descr': '{}', 'fortran_order': False, 'shape': ({}, {}), }}",
            descr, shape.0, shape.1
        );
        // Pad with spaces to a 64-byte boundary, newline-terminated.
        while (10 + header.len() + 1) % 64 != 0 {
            header.push(' ');
        }
        header.push('\n');

        let mut bytes = b"\x93NUMPY\x01\x00".to_vec();
        bytes.extend_from_slice(&(header.len() as u16).to_le_bytes());
        bytes.extend_from_slice(header.as_bytes());
        bytes.extend_from_slice(payload);
        bytes
    }

    #[test]
    fn reads_f8_c_order() {
        let values: Vec<f64> = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let payload: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        let arr = parse(&npy_bytes("<f8", (3, 2), &payload)).unwrap();
        assert_eq!((arr.rows, arr.cols), (3, 2));
        assert_eq!(arr.row(1), &[3.0, 4.0]);
    }

    #[test]
    fn widens_f4_payloads() {
        let values: Vec<f32> = vec![0.5, 1.5];
        let payload: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        let arr = parse(&npy_bytes("<f4", (1, 2), &payload)).unwrap();
        assert_eq!(arr.row(0), &[0.5, 1.5]);
    }

    #[test]
    fn rejects_bad_magic() {
        assert!(matches!(parse(b"not an npy file"), Err(NpyError::BadMagic)));
    }

    #[test]
    fn rejects_fortran_order() {
        let mut bytes = npy_bytes("<f8", (0, 4), &[]);
        let text = String::from_utf8(bytes.split_off(10)).unwrap();
        let text = text.replace("False", "True ");
        bytes.extend_from_slice(text.as_bytes());
        assert!(matches!(parse(&bytes), Err(NpyError::FortranOrder)));
    }

    #[test]
    fn rejects_truncated_payload() {
        let payload = [0u8; 8];
        assert!(matches!(
            parse(&npy_bytes("<f8", (2, 4), &payload)),
            Err(NpyError::TruncatedData { .. })
        ));
    }

    #[test]
    fn rejects_integer_dtypes() {
        assert!(matches!(
            parse(&npy_bytes("<i8", (1, 1), &[0u8; 8])),
            Err(NpyError::UnsupportedDtype(_))
        ));
    }
}
