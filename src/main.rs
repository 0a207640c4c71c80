use std::process::ExitCode;

fn install_rustls_provider() {
    use rustls::crypto::{ring, CryptoProvider};

    if CryptoProvider::get_default().is_none() {
        // Another provider racing us to install is fine.
        let _ = ring::default_provider().install_default();
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    install_rustls_provider();

    match certsync::cli::run_cli().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
