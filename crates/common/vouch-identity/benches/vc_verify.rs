use criterion::{criterion_group, criterion_main, Criterion};
use serde_json::{json, Map, Value};
use vouch_identity::{token, verify, CredentialBuilder, KeyPair, Resolver};

fn claim_body() -> Map<String, Value> {
    match json!({"metric": "Commit Count", "period": "2025-10", "result": {"value": 142}}) {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

fn bench_verify(c: &mut Criterion) {
    let issuer = KeyPair::generate();
    let holder = KeyPair::generate();
    let vc = CredentialBuilder::new(
        issuer.did.as_str(),
        holder.did.as_str(),
        "GithubActivity",
        claim_body(),
        chrono::Utc::now(),
    )
    .credential_type("RndPerformanceCredential")
    .build()
    .unwrap();
    let signed = token::issue(&vc, &issuer).unwrap();
    let resolver = Resolver::default();

    c.bench_function("vc_issue", |b| {
        b.iter(|| token::issue(&vc, &issuer).unwrap());
    });
    c.bench_function("vc_verify", |b| {
        b.iter(|| verify(&signed, &resolver).unwrap());
    });
}
criterion_group!(benches, bench_verify);
criterion_main!(benches);
