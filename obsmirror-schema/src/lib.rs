pub mod inaturalist;
pub mod mushroom_observer;

mod lax;

pub use inaturalist::{
    CreatedObservation, Identification, IdentificationTaxon, InatResults, InatUser,
    ObservationFieldValue, ObservationSummary, TaxonResult,
};
pub use mushroom_observer::{
    MoApiError, MoCollectionNumber, MoConsensus, MoHerbarium, MoHerbariumRecord, MoImage,
    MoLocation, MoObservation, MoResponse, MoSequence,
};
