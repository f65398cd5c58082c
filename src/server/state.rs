use crate::position::PositionResolver;

pub struct AppState {
    pub resolver: PositionResolver,
}
