fn main() {
    if let Err(err) = mdtally::cli::run() {
        mdtally::ui::eprintln_error(&err);
        std::process::exit(mdtally::exit::exit_code(&err));
    }
}
