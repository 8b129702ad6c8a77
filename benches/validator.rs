use criterion::{criterion_group, criterion_main, Criterion};
use recon_gateway::gateway::{
    validate_options, validate_target, ExecutionTimeout, Gateway, GatewayConfig, ProfileRegistry,
    ToolInvocation,
};
use std::hint::black_box;

fn bench_validation(c: &mut Criterion) {
    let long_url = format!("https://example.com/{}", "segment/".repeat(64));

    c.bench_function("validate_target_host", |b| {
        b.iter(|| validate_target(black_box("scanme.example.com")))
    });

    c.bench_function("validate_target_long_url", |b| {
        b.iter(|| validate_target(black_box(&long_url)))
    });

    c.bench_function("validate_target_rejected", |b| {
        b.iter(|| validate_target(black_box("example.com;cat /etc/passwd")))
    });

    c.bench_function("validate_options_blob", |b| {
        b.iter(|| validate_options(black_box("-sV -T4 -Pn --top-ports 1000")))
    });
}

fn bench_invocation(c: &mut Criterion) {
    let registry = ProfileRegistry::builtin();

    c.bench_function("invocation_from_profile", |b| {
        let profile = registry.get("nmap-custom").expect("builtin profile");
        let options = vec!["-sV".to_string(), "-T4".to_string()];
        b.iter(|| ToolInvocation::from_profile(profile, black_box("10.0.0.1"), &options, None))
    });

    // Allow overriding the spawned command to keep this portable across environments.
    let command = std::env::var("RECON_GATEWAY_BENCH_CMD").unwrap_or_else(|_| "echo".to_string());
    let rt = tokio::runtime::Runtime::new().expect("Failed to create Tokio runtime for benchmark");
    let gateway = Gateway::new(ProfileRegistry::new(), GatewayConfig::default());
    let invocation = ToolInvocation::argv("bench", &command, ["example.com"], ExecutionTimeout::short());

    c.bench_function("gateway_run_spawn", |b| {
        b.iter(|| black_box(rt.block_on(gateway.run(&invocation))))
    });
}

criterion_group!(benches, bench_validation, bench_invocation);
criterion_main!(benches);
