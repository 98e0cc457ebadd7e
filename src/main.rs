use std::{env, ffi::OsString, fmt::Debug, time::Duration};

use clap::ErrorKind::{DisplayHelp, DisplayVersion};
use log::{info, trace};

use hdf_convert::{cli::ConvertContext, get_durations, HdfConvertError::ClapError};

fn main_with_args<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
    I: Debug,
{
    let convert_ctx = match ConvertContext::from_args(args) {
        Ok(convert_ctx) => convert_ctx,
        Err(ClapError(inner)) => {
            // Swallow broken pipe errors
            trace!("clap error: {:?}", inner.kind());
            let _ = inner.print();
            match inner.kind() {
                DisplayHelp | DisplayVersion => return 0,
                _ => return 1,
            }
        }
        Err(e) => {
            eprintln!("error parsing args: {e}");
            return 1;
        }
    };

    match convert_ctx.run() {
        Ok(()) => {
            info!(
                "total duration: {:?}",
                get_durations().into_iter().fold(
                    Duration::ZERO,
                    |duration_sum, (name, duration)| {
                        info!("{} duration: {:?}", name, duration);
                        duration_sum + duration
                    }
                )
            );
            0
        }
        Err(e) => {
            eprintln!("conversion error: {e}");
            1
        }
    }
}

fn main() {
    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    )
    .target(env_logger::Target::Stdout)
    .init();
    trace!("start main");
    let retcode = main_with_args(env::args());
    trace!("end main");
    std::process::exit(retcode);
}

#[cfg(test)]
mod tests {
    use super::main_with_args;

    #[test]
    fn main_with_version_succeeds() {
        assert_eq!(main_with_args(["hdf_convert", "--version"]), 0);
    }

    #[test]
    fn main_with_help_succeeds() {
        assert_eq!(main_with_args(["hdf_convert", "--help"]), 0);
    }

    #[test]
    fn main_with_no_args_returns_1() {
        assert_ne!(main_with_args(["hdf_convert"]), 0);
    }

    #[test]
    fn main_with_missing_input_returns_1() {
        assert_ne!(
            main_with_args(["hdf_convert", "this_file_does_not_exist.fits"]),
            0
        );
    }
}
