pub mod common {
    tonic::include_proto!("io.tably.common");
}

pub mod reservation_service {
    tonic::include_proto!("io.tably.reservation_service");
}

pub mod waiting_service {
    tonic::include_proto!("io.tably.waiting_service");
}
