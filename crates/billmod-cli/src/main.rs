fn main() {
    // Reset SIGPIPE to default behavior so piping into `head` or `less`
    // terminates the module instead of panicking.
    #[cfg(unix)]
    reset_sigpipe();

    match billmod_cli::run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("Error: {}", err);
            std::process::exit(1);
        }
    }
}

#[cfg(unix)]
fn reset_sigpipe() {
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
    }
}
