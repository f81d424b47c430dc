fn main() -> anyhow::Result<()> {
    subgraph_mocker::main()
}
