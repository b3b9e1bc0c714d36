#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    pomotask_lib::run().await
}
