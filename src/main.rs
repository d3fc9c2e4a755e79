// GUI-subsystem binary: no console window is ever allocated by Windows.
// • GUI mode: nothing extra needed.
// • CLI mode (--output/-o present): AttachConsole(ATTACH_PARENT_PROCESS) attaches to
//   the launching terminal, then we reopen CONOUT$ so println!/eprintln!
//   route through the correct handles (necessary when SUBSYSTEM:WINDOWS is set).
#![windows_subsystem = "windows"]

use std::process::ExitCode;

use clap::Parser;
use layerpaint::app::LayerPaintApp;
use layerpaint::cli::{self, CliArgs};
use layerpaint::logger;
use layerpaint::settings::AppSettings;

fn main() -> ExitCode {
    // -- Windows console management ------------------------------------
    // The binary is SUBSYSTEM:WINDOWS so Windows never allocates a console.
    // In CLI mode we attach to the parent terminal and reconnect stdio handles.
    #[cfg(target_os = "windows")]
    if CliArgs::is_cli_mode() {
        unsafe extern "system" {
            fn AttachConsole(dwProcessId: u32) -> i32;
            fn SetStdHandle(nStdHandle: u32, hHandle: isize) -> i32;
            fn CreateFileW(
                lpFileName: *const u16,
                dwDesiredAccess: u32,
                dwShareMode: u32,
                lpSecurityAttributes: *const std::ffi::c_void,
                dwCreationDisposition: u32,
                dwFlagsAndAttributes: u32,
                hTemplateFile: isize,
            ) -> isize;
        }
        const ATTACH_PARENT_PROCESS: u32 = 0xFFFF_FFFF;
        const GENERIC_WRITE: u32 = 0x4000_0000;
        const FILE_SHARE_WRITE: u32 = 0x0000_0002;
        const OPEN_EXISTING: u32 = 3;
        const STD_OUTPUT_HANDLE: u32 = 0xFFFF_FFF5_u32; // -11
        const STD_ERROR_HANDLE: u32 = 0xFFFF_FFF4_u32; // -12
        const INVALID_HANDLE_VALUE: isize = -1;
        // The CLI only writes; stdin stays detached.
        unsafe {
            if AttachConsole(ATTACH_PARENT_PROCESS) != 0 {
                let conout: Vec<u16> = "CONOUT$\0".encode_utf16().collect();
                let handle = CreateFileW(
                    conout.as_ptr(),
                    GENERIC_WRITE,
                    FILE_SHARE_WRITE,
                    std::ptr::null(),
                    OPEN_EXISTING,
                    0,
                    0,
                );
                if handle != INVALID_HANDLE_VALUE {
                    SetStdHandle(STD_OUTPUT_HANDLE, handle);
                    SetStdHandle(STD_ERROR_HANDLE, handle);
                }
            }
        }
    }

    // Session log (overwrites the previous session's file)
    logger::init();
    let settings = AppSettings::load();

    // -- CLI / headless mode ---------------------------------------------
    if CliArgs::is_cli_mode() {
        return cli::run(CliArgs::parse(), &settings);
    }

    // -- GUI mode -----------------------------------------------------
    let app = match LayerPaintApp::new(settings) {
        Ok(app) => app,
        Err(e) => {
            log::error!("main: could not create the canvas: {}", e);
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 720.0])
            .with_title("LayerPaint"),
        ..Default::default()
    };

    match eframe::run_native("LayerPaint", options, Box::new(move |_cc| Box::new(app))) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("main: event loop failed: {}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
