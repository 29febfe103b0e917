fn main() -> anyhow::Result<()> {
    stratolink_fec::cli::run()
}
