use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use std::sync::Arc;

use salesflow_core::{ActorId, Ipn, Money};
use salesflow_infra::projections::OrderSummariesProjection;
use salesflow_infra::read_model::InMemoryReadModelStore;
use salesflow_infra::{
    InMemoryAuditSink, InMemoryEventStore, InMemoryQuoteBook, InMemorySequenceGenerator,
    InventoryService, LifecycleConfig, NewSalesOrder, OrderLifecycle, StockReceipt,
};
use salesflow_sales::NewOrderLine;

type Store = Arc<InMemoryEventStore>;

fn setup() -> (OrderLifecycle<Store>, InventoryService<Store>, Store) {
    let store: Store = Arc::new(InMemoryEventStore::new());
    let audit = Arc::new(InMemoryAuditSink::new());
    let config = LifecycleConfig::default();
    let lifecycle = OrderLifecycle::new(
        store.clone(),
        Arc::new(InMemorySequenceGenerator::new()),
        Arc::new(InMemoryQuoteBook::new()),
        audit.clone(),
        config.clone(),
    );
    let inventory = InventoryService::new(store.clone(), audit, config.max_commit_attempts);
    (lifecycle, inventory, store)
}

fn actor() -> ActorId {
    ActorId::new("bench").unwrap()
}

fn part(n: usize) -> String {
    format!("PART-{n:03}")
}

fn stock(inventory: &InventoryService<Store>, parts: usize, qty: i64) {
    for n in 0..parts {
        inventory
            .receive(
                &Ipn::new(part(n)).unwrap(),
                StockReceipt {
                    qty,
                    reference: "PO-BENCH".to_string(),
                    ..StockReceipt::default()
                },
                &actor(),
            )
            .unwrap();
    }
}

fn order_input(lines: usize) -> NewSalesOrder {
    NewSalesOrder {
        customer: "Bench Co".to_string(),
        lines: (0..lines)
            .map(|n| NewOrderLine {
                ipn: part(n),
                description: String::new(),
                qty: 1,
                unit_price: Money::from_cents(199),
                notes: String::new(),
            })
            .collect(),
        ..NewSalesOrder::default()
    }
}

fn bench_allocation_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocation_latency");

    // One atomic commit spans the order stream plus one ledger stream per line.
    for lines in [1usize, 5, 20] {
        group.throughput(Throughput::Elements(lines as u64));
        group.bench_with_input(BenchmarkId::from_parameter(lines), &lines, |b, &lines| {
            let (lifecycle, inventory, _) = setup();
            stock(&inventory, lines, i64::MAX / 2);
            let who = actor();
            b.iter(|| {
                let order = lifecycle.create_order(order_input(lines), &who).unwrap();
                let id = order.order_id().clone();
                lifecycle.confirm(&id, &who).unwrap();
                black_box(lifecycle.allocate(&id, &who).unwrap());
            });
        });
    }

    group.finish();
}

fn bench_inventory_rehydration(c: &mut Criterion) {
    let mut group = c.benchmark_group("inventory_rehydration");

    for history in [10usize, 100, 1_000] {
        group.bench_with_input(BenchmarkId::from_parameter(history), &history, |b, &history| {
            let (_, inventory, _) = setup();
            for _ in 0..history {
                stock(&inventory, 1, 1);
            }
            let ipn = Ipn::new(part(0)).unwrap();
            b.iter(|| black_box(inventory.get(&ipn).unwrap().available()));
        });
    }

    group.finish();
}

fn bench_projection_rebuild(c: &mut Criterion) {
    let mut group = c.benchmark_group("projection_rebuild");
    group.sample_size(20);

    for orders in [100usize, 1_000] {
        let (lifecycle, _, store) = setup();
        let who = actor();
        for _ in 0..orders {
            let order = lifecycle.create_order(order_input(3), &who).unwrap();
            lifecycle.confirm(order.order_id(), &who).unwrap();
        }

        group.throughput(Throughput::Elements(orders as u64 * 2));
        group.bench_with_input(BenchmarkId::from_parameter(orders), &store, |b, store| {
            b.iter(|| {
                let projection = OrderSummariesProjection::new(InMemoryReadModelStore::new());
                black_box(projection.rebuild_from_store(store).unwrap())
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_allocation_latency,
    bench_inventory_rehydration,
    bench_projection_rebuild
);
criterion_main!(benches);
