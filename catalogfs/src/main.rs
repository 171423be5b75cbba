//! Mount-lifecycle entry point: parse arguments, open the source directory,
//! install the logger, and hand the dispatcher to the FUSE session loop.

use std::process::ExitCode;

use catalogfs::cli::CliArgs;
use catalogfs::context::MountContext;
use catalogfs::dispatcher::CatalogFs;
use catalogfs::logger;
use catalogfs_sidecar::converters::OverlayFlags;
use clap::Parser;
use fuser::MountOption;

fn main() -> ExitCode {
    let args = CliArgs::parse();

    if let Some(log_path) = &args.log {
        if let Err(e) = logger::init(log_path, args.log_errors_only) {
            eprintln!("catalogfs: failed to open log file {log_path:?}: {e}");
            return ExitCode::FAILURE;
        }
    }

    // Force an open umask so mkdir/create modes are honored exactly as
    // requested by the caller, rather than masked by the daemon's own
    // inherited umask.
    unsafe {
        libc::umask(0);
    }

    if !args.foreground {
        if let Err(e) = nix::unistd::daemon(false, false) {
            eprintln!("catalogfs: failed to background: {e}");
            return ExitCode::FAILURE;
        }
    }

    let overlay = OverlayFlags {
        mode: !args.ignore_saved_mode,
        times: !args.ignore_saved_times,
        uid: args.use_saved_uid,
        gid: args.use_saved_gid,
    };

    let source = args.source_dir();
    let ctx = match MountContext::open(&source, overlay, args.log_errors_only) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("catalogfs: failed to open source directory {source:?}: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut options = vec![
        MountOption::RW,
        MountOption::FSName("catalogfs".to_string()),
        MountOption::DefaultPermissions,
    ];
    if args.allow_other {
        options.push(MountOption::AllowOther);
    }
    if args.allow_root {
        options.push(MountOption::AllowRoot);
    }
    if args.auto_unmount {
        options.push(MountOption::AutoUnmount);
    }

    let fs = CatalogFs::new(ctx);
    match fuser::mount2(fs, &args.mountpoint, &options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("catalogfs: mount failed: {e}");
            ExitCode::FAILURE
        }
    }
}
