use common::{Money, ProductId};
use criterion::{Criterion, criterion_group, criterion_main};
use inventory::ReservationService;
use store::{InMemoryStore, Product, Store, Variant};

fn seed(rt: &tokio::runtime::Runtime, stock: u32) -> (InMemoryStore, ProductId) {
    let store = InMemoryStore::new();
    let product = Product::new(ProductId::new(), "Bench Tee", Money::from_cents(1000))
        .with_variants(vec![Variant::new("M", "Red", stock)]);
    let id = product.id;
    rt.block_on(async { store.insert_product(&product).await.unwrap() });
    (store, id)
}

fn bench_reserve_release(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (store, id) = seed(&rt, u32::MAX / 2);
    let service = ReservationService::new(store.clone());

    c.bench_function("inventory/reserve_release", |b| {
        b.iter(|| {
            rt.block_on(async {
                let mut tx = store.begin().await.unwrap();
                assert!(service.reserve_variant(&mut tx, id, "M", "Red", 1).await.unwrap());
                service
                    .release_variant(&mut tx, id, "M", "Red", 1)
                    .await
                    .unwrap();
                store.commit(tx).await.unwrap();
            });
        });
    });
}

fn bench_reserve_finalize(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (store, id) = seed(&rt, u32::MAX / 2);
    let service = ReservationService::new(store.clone());

    c.bench_function("inventory/reserve_finalize", |b| {
        b.iter(|| {
            rt.block_on(async {
                let mut tx = store.begin().await.unwrap();
                assert!(service.reserve_variant(&mut tx, id, "M", "Red", 1).await.unwrap());
                service
                    .finalize_variant(&mut tx, id, "M", "Red", 1)
                    .await
                    .unwrap();
                store.commit(tx).await.unwrap();
            });
        });
    });
}

criterion_group!(benches, bench_reserve_release, bench_reserve_finalize);
criterion_main!(benches);
