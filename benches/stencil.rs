use criterion::{black_box, criterion_group, criterion_main, Criterion};
use jfnk_diffusion::{Field, GridDiscretization, NewtonSolver, ProcessContext, SolverOptions, ThreadComm};

fn context(n: usize) -> ProcessContext<ThreadComm> {
    let disc = GridDiscretization::new(n, n, 100, 0.01).unwrap();
    let mut ctx = ProcessContext::new(ThreadComm::solo(), disc, SolverOptions::default()).unwrap();
    ctx.init_with(|gy, gx| if gy < n / 4 && gx < n / 4 { 0.1 } else { 0.0 });
    ctx
}

fn bench_stencil(c: &mut Criterion) {
    #[cfg(feature = "rayon")]
    jfnk_diffusion::parallel::init_thread_pool(None);
    let n = 256;
    let mut ctx = context(n);
    let u = ctx.x_new.clone();
    let mut s = Field::zeros(n, n);

    c.bench_function("residual 256x256", |ben| {
        ben.iter(|| {
            ctx.evaluate(black_box(&u), black_box(&mut s)).unwrap();
        })
    });

    c.bench_function("newton step 128x128", |ben| {
        ben.iter_batched(
            || {
                let mut ctx = context(128);
                ctx.begin_time_step();
                ctx
            },
            |mut ctx| {
                let mut newton = NewtonSolver::new(&ctx);
                black_box(newton.step(&mut ctx).unwrap());
            },
            criterion::BatchSize::LargeInput,
        )
    });
}

criterion_group!(benches, bench_stencil);
criterion_main!(benches);
