//! Open/lookup/close probes against a shared-library service.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use portsl_core::{
    DynamicLinker, LibraryEnumerator, OpenFlags, SharedLibraries, SymbolDescriptor,
};

use crate::error::HarnessError;
use crate::structured_log::{LogEmitter, LogEntry, LogLevel, Outcome};

/// A symbol to resolve, written `NAME` or `NAME:SIGNATURE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolSpec {
    pub name: String,
    pub signature: String,
}

impl std::str::FromStr for SymbolSpec {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, signature) = s.split_once(':').unwrap_or((s, ""));
        if name.is_empty() {
            return Err(HarnessError::SymbolSpec(s.to_string()));
        }
        Ok(Self {
            name: name.to_string(),
            signature: signature.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolProbe {
    pub name: String,
    pub signature: String,
    pub found: bool,
}

/// Result of probing one library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeReport {
    pub library: String,
    pub flags: u32,
    /// `0` on success, otherwise the port-layer error code.
    pub open_code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub symbols: Vec<SymbolProbe>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close_code: Option<i32>,
}

impl ProbeReport {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.open_code == 0
            && self.symbols.iter().all(|s| s.found)
            && self.close_code.unwrap_or(0) == 0
    }
}

/// Open `library`, resolve each of `symbols`, then close it again.
///
/// Every step is written to `log`.
pub fn probe_library<L, E, W>(
    service: &SharedLibraries<L, E>,
    library: &str,
    flags: OpenFlags,
    symbols: &[SymbolSpec],
    log: &mut LogEmitter<W>,
) -> std::io::Result<ProbeReport>
where
    L: DynamicLinker,
    E: LibraryEnumerator,
    W: std::io::Write,
{
    let started = Instant::now();
    let opened = service.open(library, flags);
    let latency = started.elapsed().as_nanos() as u64;

    let mut report = ProbeReport {
        library: library.to_string(),
        flags: flags.bits(),
        open_code: 0,
        error: None,
        symbols: Vec::with_capacity(symbols.len()),
        close_code: None,
    };

    let handle = match opened {
        Ok(handle) => {
            log.emit_entry(
                LogEntry::new("", LogLevel::Info, "open")
                    .with_library(library)
                    .with_outcome(Outcome::Pass)
                    .with_code(0)
                    .with_latency_ns(latency),
            )?;
            handle
        }
        Err(err) => {
            log.emit_entry(
                LogEntry::new("", LogLevel::Warn, "open")
                    .with_library(library)
                    .with_outcome(Outcome::Fail)
                    .with_code(err.code())
                    .with_latency_ns(latency)
                    .with_details(serde_json::json!({
                        "kind": err.kind.as_str(),
                        "message": &err.message,
                    })),
            )?;
            report.open_code = err.code();
            report.error = Some(err.message);
            return Ok(report);
        }
    };

    for spec in symbols {
        let descriptor = SymbolDescriptor::new(&spec.name, &spec.signature);
        let found = service.lookup(handle, &descriptor).is_ok();
        log.emit_entry(
            LogEntry::new("", LogLevel::Info, "lookup")
                .with_library(library)
                .with_symbol(&spec.name)
                .with_outcome(if found { Outcome::Pass } else { Outcome::Fail }),
        )?;
        report.symbols.push(SymbolProbe {
            name: spec.name.clone(),
            signature: spec.signature.clone(),
            found,
        });
    }

    let close_code = service.close(handle);
    log.emit_entry(
        LogEntry::new("", LogLevel::Info, "close")
            .with_library(library)
            .with_code(close_code),
    )?;
    report.close_code = Some(close_code);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_symbol_specs() {
        let spec: SymbolSpec = "strlen:pL".parse().unwrap();
        assert_eq!(spec.name, "strlen");
        assert_eq!(spec.signature, "pL");

        let spec: SymbolSpec = "malloc".parse().unwrap();
        assert_eq!(spec.signature, "");

        assert!(":V".parse::<SymbolSpec>().is_err());
    }

    #[test]
    fn report_pass_requires_every_step() {
        let mut report = ProbeReport {
            library: "libc.so.6".into(),
            flags: 0,
            open_code: 0,
            error: None,
            symbols: vec![SymbolProbe {
                name: "strlen".into(),
                signature: String::new(),
                found: true,
            }],
            close_code: Some(0),
        };
        assert!(report.passed());
        report.symbols[0].found = false;
        assert!(!report.passed());
    }
}
