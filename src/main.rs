fn main() -> anyhow::Result<()> {
    marble_rush_lib::run()
}
