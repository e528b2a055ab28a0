use shardstream::{
    CpuContext, HttpTransport, LoaderOptions, ShardLoadError, open_shard,
};

pub fn handle_fetch(url: String, workers: usize, retries: u32) {
    let options = LoaderOptions {
        num_workers: workers,
        max_retries: retries,
        ..LoaderOptions::default()
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("Failed to start the async runtime: {err}");
            std::process::exit(1);
        },
    };

    let result: Result<_, ShardLoadError> = runtime.block_on(async {
        let transport = HttpTransport::new()?;
        let context = CpuContext::new();
        open_shard(&url, &transport, &context, options).await
    });

    match result {
        Ok(handle) => {
            println!(
                "{} ({} data bytes)",
                handle.location().url,
                handle.data_region_length()
            );
            let mut views: Vec<_> = handle.views().collect();
            views.sort_by(|a, b| a.0.cmp(b.0));
            for (name, view) in views {
                println!(
                    "  {name}  {:?}  {:?}  {} bytes",
                    view.data_type(),
                    view.shape(),
                    view.size_in_bytes()
                );
            }
            handle.close();
        },
        Err(err) => {
            eprintln!("Failed to load shard: {err}");
            std::process::exit(1);
        },
    }
}
