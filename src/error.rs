use std::io;
use std::process::ExitStatus;
use quick_error::quick_error;

quick_error! {
    #[derive(Debug)]
    pub enum Error {
        /// Internal error
        ThreadSend {
            display("Internal error; unexpectedly aborted")
        }
        Aborted {
            display("aborted")
        }
        Gif(err: gif::DecodingError) {
            display("GIF decoding error: {}", err)
        }
        Dispose(err: gif_dispose::Error) {
            from()
            display("gif dispose error: {}", err)
        }
        NoFrames {
            display("Found no usable frames to encode")
        }
        Io(err: io::Error) {
            from()
            from(_oom: std::collections::TryReserveError) -> (io::ErrorKind::OutOfMemory.into())
            display("I/O: {}", err)
        }
        PNG(msg: String) {
            display("{}", msg)
        }
        ToolNotFound(name: &'static str) {
            display("Can't find `{}`. Install it and make sure it's in PATH, or put the executable next to this program", name)
        }
        ToolMissing(name: &'static str, path: std::path::PathBuf) {
            display("Can't find `{}` at \"{}\"", name, path.display())
        }
        Encoder(status: ExitStatus, stderr: String) {
            display("avifenc failed ({}){}{}", status, if stderr.is_empty() { "" } else { ": " }, stderr.trim_end())
        }
    }
}

pub type ConvResult<T, E = Error> = Result<T, E>;

impl<T> From<crossbeam_channel::SendError<T>> for Error {
    #[cold]
    fn from(_: crossbeam_channel::SendError<T>) -> Self {
        Self::ThreadSend
    }
}

impl From<crossbeam_channel::RecvError> for Error {
    #[cold]
    fn from(_: crossbeam_channel::RecvError) -> Self {
        Self::Aborted
    }
}

impl From<gif::DecodingError> for Error {
    #[cold]
    fn from(err: gif::DecodingError) -> Self {
        match err {
            gif::DecodingError::Io(err) => err.into(),
            other => Error::Gif(other),
        }
    }
}

#[test]
fn channel_errors() {
    let (tx, rx) = crossbeam_channel::bounded::<u8>(1);
    drop(rx);
    let send = || -> ConvResult<()> { Ok(tx.send(1)?) };
    assert!(matches!(send(), Err(Error::ThreadSend)));

    let (tx, rx) = crossbeam_channel::bounded::<u8>(1);
    drop(tx);
    let recv = || -> ConvResult<u8> { Ok(rx.recv()?) };
    assert!(matches!(recv(), Err(Error::Aborted)));
}
