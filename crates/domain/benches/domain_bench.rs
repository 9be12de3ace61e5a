use criterion::{Criterion, criterion_group, criterion_main};
use domain::{Address, Money, Order, OrderItem};

fn make_order(items: usize) -> Order {
    let mut order = Order::new(
        "order-bench",
        "cust-bench",
        "bench@example.com",
        Address::new("123 Main St", "San Francisco", "CA", "94102", "USA"),
    );
    for i in 0..items {
        order = order.with_item(OrderItem::new(
            format!("SKU-{i:03}"),
            "Benchmark Widget",
            1,
            Money::from_cents(1000),
        ));
    }
    order
}

fn bench_validate(c: &mut Criterion) {
    let order = make_order(50);

    c.bench_function("domain/validate_50_items", |b| {
        b.iter(|| order.validate().unwrap());
    });
}

fn bench_parse_order(c: &mut Criterion) {
    let json = serde_json::to_string(&make_order(10)).unwrap();

    c.bench_function("domain/parse_order_10_items", |b| {
        b.iter(|| {
            let order: Order = serde_json::from_str(&json).unwrap();
            order
        });
    });
}

criterion_group!(benches, bench_validate, bench_parse_order);
criterion_main!(benches);
