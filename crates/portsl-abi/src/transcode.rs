//! Host error-text strategies: locale `mbtowc` and `iconv`.

use std::ffi::{CStr, c_char, c_int, c_void};

use portsl_core::TranscoderChoice;
use portsl_core::error_text::{
    CodesetConverter, CodesetTranscoder, ConvertStatus, ConvertStep, DecodeStep, MultibyteDecoder,
    RawCopy, WideCharTranscoder, normalize_error_text,
};

type IconvT = *mut c_void;

unsafe extern "C" {
    fn mbtowc(pwc: *mut libc::wchar_t, s: *const c_char, n: libc::size_t) -> c_int;
}

#[cfg_attr(target_vendor = "apple", link(name = "iconv"))]
unsafe extern "C" {
    fn iconv_open(tocode: *const c_char, fromcode: *const c_char) -> IconvT;
    fn iconv(
        cd: IconvT,
        inbuf: *mut *mut c_char,
        inbytesleft: *mut libc::size_t,
        outbuf: *mut *mut c_char,
        outbytesleft: *mut libc::size_t,
    ) -> libc::size_t;
    fn iconv_close(cd: IconvT) -> c_int;
}

/// [`MultibyteDecoder`] over the C library's `mbtowc` and current locale.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocaleDecoder;

impl MultibyteDecoder for LocaleDecoder {
    fn reset(&mut self) {
        // SAFETY: a null string resets the shift state and reads nothing.
        unsafe {
            mbtowc(std::ptr::null_mut(), std::ptr::null(), 0);
        }
    }

    fn decode(&mut self, input: &[u8]) -> DecodeStep {
        if input.is_empty() {
            return DecodeStep::End;
        }
        let mut wc: libc::wchar_t = 0;
        // SAFETY: `input` is readable for `input.len()` bytes and `wc` is a
        // live out-parameter.
        let rc = unsafe { mbtowc(&mut wc, input.as_ptr().cast::<c_char>(), input.len()) };
        match rc {
            n if n < 0 => DecodeStep::Invalid,
            0 => DecodeStep::End,
            n => DecodeStep::Char {
                ch: wc as u32,
                len: n as usize,
            },
        }
    }
}

/// `iconv` descriptor from the locale codeset to UTF-8. Closed on drop.
#[derive(Debug)]
pub struct IconvConverter {
    cd: IconvT,
}

impl IconvConverter {
    /// Open a converter from `codeset` to UTF-8. `None` when iconv has no
    /// such conversion.
    pub fn new(codeset: &CStr) -> Option<Self> {
        // SAFETY: both names are NUL-terminated and outlive the call.
        let cd = unsafe { iconv_open(c"UTF-8".as_ptr(), codeset.as_ptr()) };
        if cd as isize == -1 {
            tracing::trace!(codeset = ?codeset, "no iconv converter");
            return None;
        }
        Some(Self { cd })
    }

    /// Open a converter for `nl_langinfo(CODESET)`. `None` when the codeset
    /// is unknown or has no converter.
    pub fn for_locale() -> Option<Self> {
        // SAFETY: CODESET is a valid item; the result is null or a string
        // owned by the C library.
        let codeset = unsafe { libc::nl_langinfo(libc::CODESET) };
        if codeset.is_null() {
            return None;
        }
        // SAFETY: non-null nl_langinfo results are NUL-terminated.
        Self::new(unsafe { CStr::from_ptr(codeset) })
    }
}

impl CodesetConverter for IconvConverter {
    fn convert(&mut self, input: &[u8], out: &mut [u8]) -> ConvertStep {
        let mut inbuf = input.as_ptr().cast::<c_char>().cast_mut();
        let mut inleft = input.len();
        let mut outbuf = out.as_mut_ptr().cast::<c_char>();
        let mut outleft = out.len();

        // SAFETY: the four cursors describe `input` and `out` exactly; iconv
        // only reads `inleft` bytes and writes at most `outleft`.
        let rc = unsafe { iconv(self.cd, &mut inbuf, &mut inleft, &mut outbuf, &mut outleft) };
        let status = if rc == usize::MAX {
            match std::io::Error::last_os_error().raw_os_error() {
                Some(libc::E2BIG) => ConvertStatus::OutputFull,
                _ => ConvertStatus::Unconvertible,
            }
        } else {
            ConvertStatus::Done
        };
        ConvertStep {
            consumed: input.len() - inleft,
            written: out.len() - outleft,
            status,
        }
    }
}

impl Drop for IconvConverter {
    fn drop(&mut self) {
        // SAFETY: `cd` came from a successful iconv_open and is closed once.
        unsafe {
            iconv_close(self.cd);
        }
    }
}

/// Strategy `Auto` stands for on this target.
#[must_use]
pub const fn resolve(choice: TranscoderChoice) -> TranscoderChoice {
    match choice {
        TranscoderChoice::Auto => {
            if cfg!(any(target_os = "linux", target_os = "android", target_vendor = "apple")) {
                TranscoderChoice::WideChar
            } else if cfg!(unix) {
                TranscoderChoice::Codeset
            } else {
                TranscoderChoice::Raw
            }
        }
        other => other,
    }
}

/// Normalize loader text with the host strategy for `choice`.
pub fn normalize_host(choice: TranscoderChoice, raw: Option<&[u8]>, out: &mut [u8]) -> usize {
    match resolve(choice) {
        TranscoderChoice::WideChar => {
            normalize_error_text(raw, out, &mut WideCharTranscoder::new(LocaleDecoder))
        }
        TranscoderChoice::Codeset => normalize_error_text(
            raw,
            out,
            &mut CodesetTranscoder::new(IconvConverter::for_locale()),
        ),
        TranscoderChoice::Auto | TranscoderChoice::Raw => {
            normalize_error_text(raw, out, &mut RawCopy)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portsl_core::error_text::MAX_ERR_BUF_LENGTH;

    fn normalized(choice: TranscoderChoice, raw: &[u8]) -> Vec<u8> {
        let mut buf = [0_u8; MAX_ERR_BUF_LENGTH];
        let len = normalize_host(choice, Some(raw), &mut buf);
        assert_eq!(buf[len], 0);
        buf[..len].to_vec()
    }

    #[test]
    fn auto_resolves_to_concrete_strategy() {
        assert_ne!(resolve(TranscoderChoice::Auto), TranscoderChoice::Auto);
        assert_eq!(resolve(TranscoderChoice::Raw), TranscoderChoice::Raw);
        if cfg!(target_os = "linux") {
            assert_eq!(resolve(TranscoderChoice::Auto), TranscoderChoice::WideChar);
        }
    }

    #[test]
    fn ascii_survives_every_strategy() {
        let text = b"libfoo.so: cannot open shared object file";
        for choice in [
            TranscoderChoice::WideChar,
            TranscoderChoice::Codeset,
            TranscoderChoice::Raw,
        ] {
            assert_eq!(normalized(choice, text), text, "{choice:?}");
        }
    }

    #[test]
    fn wide_strategy_flattens_line_breaks() {
        assert_eq!(
            normalized(TranscoderChoice::WideChar, b"first\r\nsecond"),
            b"first second"
        );
    }

    #[test]
    fn absent_text_is_unknown_error() {
        let mut buf = [0_u8; 64];
        let len = normalize_host(TranscoderChoice::Auto, None, &mut buf);
        assert_eq!(&buf[..len], b"Unknown error");
    }

    fn converted(codeset: &CStr, raw: &[u8], cap: usize) -> Vec<u8> {
        let converter = IconvConverter::new(codeset);
        assert!(converter.is_some(), "iconv lacks {codeset:?}");
        let mut buf = vec![0xff_u8; cap];
        let len = normalize_error_text(Some(raw), &mut buf, &mut CodesetTranscoder::new(converter));
        assert!(len < cap);
        assert_eq!(buf[len], 0);
        buf.truncate(len);
        buf
    }

    #[test]
    fn iconv_converts_latin1_to_utf8() {
        assert_eq!(
            converted(c"ISO-8859-1", b"caf\xe9: not found", 64),
            "caf\u{e9}: not found".as_bytes()
        );
    }

    #[test]
    fn iconv_copies_unconvertible_byte_through() {
        assert_eq!(
            converted(c"ASCII", b"bad \xff byte", 64),
            b"bad \xff byte"
        );
        // Same rule through the host strategy, whatever the test locale.
        assert_eq!(
            normalized(TranscoderChoice::Codeset, b"bad \xff byte"),
            b"bad \xff byte"
        );
    }

    #[test]
    fn iconv_stops_before_split_sequence() {
        // Four usable bytes: "caf" fits, the two-byte e-acute does not.
        let out = converted(c"ISO-8859-1", b"caf\xe9", 5);
        assert_eq!(out, b"caf");
        assert!(std::str::from_utf8(&out).is_ok());

        let out = converted(c"ISO-8859-1", b"caf\xe9", 6);
        assert_eq!(out, "caf\u{e9}".as_bytes());
    }

    #[test]
    fn codeset_strategy_is_bounded() {
        let mut buf = [0xff_u8; 4];
        let len = normalize_host(TranscoderChoice::Codeset, Some(b"0123456789"), &mut buf);
        assert_eq!(len, 3);
        assert_eq!(&buf, b"012\0");
    }

    #[test]
    fn bounded_output() {
        let mut buf = [0xff_u8; 8];
        let len = normalize_host(TranscoderChoice::Raw, Some(b"0123456789"), &mut buf);
        assert_eq!(len, 7);
        assert_eq!(&buf[..8], b"0123456\0");
    }
}
