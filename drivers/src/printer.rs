/*++

Licensed under the Apache-2.0 license.

File Name:

    printer.rs

Abstract:

    File contains support routines and macros for diagnostic printing.

--*/
use core::convert::Infallible;
use ufmt::uWrite;

#[derive(Default)]
pub struct Printer;

cfg_if::cfg_if! {
    if #[cfg(feature = "std")] {
        impl uWrite for Printer {
            type Error = Infallible;

            /// Writes a string slice into this writer, returning whether the write succeeded.
            fn write_str(&mut self, str: &str) -> Result<(), Self::Error> {
                print!("{str}");
                Ok(())
            }
        }
    } else {
        impl uWrite for Printer {
            type Error = Infallible;

            /// The diagnostic UART belongs to the boot bootstrap; bare builds
            /// sink the output.
            fn write_str(&mut self, _str: &str) -> Result<(), Self::Error> {
                Ok(())
            }
        }
    }
}

#[macro_export]
macro_rules! cprint {
    ($($tt:tt)*) => {{
        let _ = ufmt::uwrite!(&mut $crate::printer::Printer::default(), $($tt)*);
    }}
}

#[macro_export]
macro_rules! cprintln {
    ($($tt:tt)*) => {{
        let _ = ufmt::uwriteln!(&mut $crate::printer::Printer::default(), $($tt)*);
    }}
}
