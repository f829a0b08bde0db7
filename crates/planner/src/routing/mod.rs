//! Query → topic routing: the precedence gate and the embedding router.

pub mod gate;
pub mod router;

pub use gate::{GateMatch, GateRule, PrecedenceGate, tokenize};
pub use router::{
    FallbackReason, RankingSource, RoutingResult, RoutingTiming, RoutingTrace, TopicGroup,
    TopicRouter, TopicScore, is_retrieval_query,
};
