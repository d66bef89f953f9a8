#[cfg(feature = "log")]
macro_rules! usb_log {
    (trace, $($arg:expr),*) => { log::trace!($($arg),*) };
    (debug, $($arg:expr),*) => { log::debug!($($arg),*) };
    (warn, $($arg:expr),*) => { log::warn!($($arg),*) };
}

#[cfg(not(feature = "log"))]
macro_rules! usb_log {
    ($level:ident, $($arg:expr),*) => {{ $( let _ = &$arg; )* }}
}

macro_rules! usb_trace {
    ($($arg:expr),*) => (usb_log!(trace, $($arg),*));
}

macro_rules! usb_debug {
    ($($arg:expr),*) => (usb_log!(debug, $($arg),*));
}

macro_rules! usb_warn {
    ($($arg:expr),*) => (usb_log!(warn, $($arg),*));
}
