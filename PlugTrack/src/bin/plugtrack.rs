fn main() -> anyhow::Result<()> {
    plugtrack::cli::run_cli()
}
