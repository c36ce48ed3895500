use opentelemetry::{
    global,
    metrics::{Counter, Histogram, Meter},
};
use std::sync::LazyLock;

pub static METER: LazyLock<Meter> = LazyLock::new(|| global::meter("ai-research-agent"));

// --- LLM client metrics ---

pub static GEN_AI_TOKEN_USAGE: LazyLock<Histogram<f64>> = LazyLock::new(|| {
    METER
        .f64_histogram("gen_ai.client.token.usage")
        .with_description("Number of tokens used per LLM call")
        .with_unit("{token}")
        .build()
});

pub static GEN_AI_OPERATION_DURATION: LazyLock<Histogram<f64>> = LazyLock::new(|| {
    METER
        .f64_histogram("gen_ai.client.operation.duration")
        .with_description("Duration of LLM operations in seconds")
        .with_unit("s")
        .build()
});

pub static GEN_AI_COST: LazyLock<Counter<f64>> = LazyLock::new(|| {
    METER
        .f64_counter("gen_ai.client.cost")
        .with_description("Estimated cost of LLM operations in USD")
        .with_unit("usd")
        .build()
});

pub static GEN_AI_ERROR_COUNT: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("gen_ai.client.error.count")
        .with_description("Number of LLM call errors")
        .with_unit("{error}")
        .build()
});

// --- Research pipeline metrics ---

pub static SOURCES_COLLECTED: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("research.sources.collected")
        .with_description("Sources that returned content")
        .with_unit("{source}")
        .build()
});

pub static SOURCES_FAILED: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("research.sources.failed")
        .with_description("Sources that failed or timed out")
        .with_unit("{source}")
        .build()
});

pub static DIMENSIONS_SUCCEEDED: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("research.dimensions.succeeded")
        .with_description("Analysis dimensions that produced a result")
        .with_unit("{dimension}")
        .build()
});

pub static DIMENSIONS_FAILED: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("research.dimensions.failed")
        .with_description("Analysis dimensions omitted after a failed call")
        .with_unit("{dimension}")
        .build()
});

pub static SYNTHESIS_FAILURES: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("research.synthesis.failures")
        .with_description("Runs whose synthesis failed before any dimension ran")
        .with_unit("{run}")
        .build()
});

pub static REPORT_GENERATION_DURATION: LazyLock<Histogram<f64>> = LazyLock::new(|| {
    METER
        .f64_histogram("report.generation.duration")
        .with_description("Total research run duration in seconds")
        .with_unit("s")
        .build()
});

pub static REPORT_SECTIONS: LazyLock<Histogram<f64>> = LazyLock::new(|| {
    METER
        .f64_histogram("report.sections")
        .with_description("Number of dimension sections rendered per report")
        .with_unit("{section}")
        .build()
});
