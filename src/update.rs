//! Firmware update checks against a plain HTTP server.
//!
//! `GET /version` answers three lines: the version, the CRC32 of the image
//! and its size in bytes. `GET /firmware` streams the image itself.

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    Header,
    Status(u16),
    Body,
    Version,
}

/// Pre-release stage, a release without suffix sorts after all of them
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Stage {
    Alpha,
    Beta,
    Rc,
    Other,
    Release,
}

/// Semantic version, `1.2.3` or `1.2.3-rc.1`, optionally with a `v` prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    major: u32,
    minor: u32,
    patch: u32,
    stage: Stage,
    stage_number: Option<u32>,
}

impl Version {
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let text = text.strip_prefix(|c| c == 'v' || c == 'V').unwrap_or(text);
        let (core, pre) = match text.split_once('-') {
            Some((core, pre)) => (core, Some(pre)),
            None => (text, None),
        };

        let mut parts = core.split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next()?.parse().ok()?;
        let patch = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }

        let (stage, stage_number) = match pre {
            Some(pre) => parse_stage(pre),
            None => (Stage::Release, None),
        };

        Some(Self {
            major,
            minor,
            patch,
            stage,
            stage_number,
        })
    }

    pub fn is_newer_than(&self, other: &Self) -> bool {
        self > other
    }
}

fn parse_stage(pre: &str) -> (Stage, Option<u32>) {
    for (name, stage) in [
        ("alpha", Stage::Alpha),
        ("beta", Stage::Beta),
        ("rc", Stage::Rc),
    ] {
        if pre
            .get(..name.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(name))
        {
            let number = pre[name.len()..].trim_start_matches('.').parse().ok();
            return (stage, number);
        }
    }
    (Stage::Other, pre.parse().ok())
}

/// Answer to `GET /version`
#[derive(Debug, PartialEq, Eq)]
pub struct Release {
    pub version: Version,
    pub crc32: u32,
    pub size: usize,
}

fn parse_number(text: &str) -> Option<u32> {
    let text = text.trim();
    match text.strip_prefix("0x") {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}

pub fn parse_release(body: &[u8]) -> Result<Release, Error> {
    let text = core::str::from_utf8(body).map_err(|_| Error::Body)?;
    let mut lines = text.lines();

    let version = Version::parse(lines.next().ok_or(Error::Body)?).ok_or(Error::Version)?;
    let crc32 = lines.next().and_then(parse_number).ok_or(Error::Body)?;
    let size = lines.next().and_then(parse_number).ok_or(Error::Body)? as usize;
    if size == 0 {
        return Err(Error::Body);
    }

    Ok(Release {
        version,
        crc32,
        size,
    })
}

/// Offset of the body once the blank line ending the header is in `buf`
pub fn header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|pos| pos + 4)
}

/// Checks the status line, only `200` is accepted
pub fn check_status(head: &[u8]) -> Result<(), Error> {
    let line = head.split(|&b| b == b'\r').next().ok_or(Error::Header)?;
    let line = core::str::from_utf8(line).map_err(|_| Error::Header)?;

    let mut words = line.split_ascii_whitespace();
    if !words.next().is_some_and(|proto| proto.starts_with("HTTP/")) {
        return Err(Error::Header);
    }
    let code = words
        .next()
        .and_then(|code| code.parse().ok())
        .ok_or(Error::Header)?;

    match code {
        200 => Ok(()),
        code => Err(Error::Status(code)),
    }
}
