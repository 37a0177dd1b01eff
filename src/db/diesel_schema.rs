// Table definitions matching the DDL in `schema.rs`.

diesel::table! {
    users (id) {
        id -> Text,
        username -> Text,
        email -> Text,
        full_name -> Text,
        role -> Text,
        is_active -> Integer,
        created_at -> Text,
    }
}

diesel::table! {
    lecturers (id) {
        id -> Text,
        lecturer_code -> Text,
        department -> Text,
        created_at -> Text,
    }
}

diesel::table! {
    students (id) {
        id -> Text,
        student_code -> Text,
        program_of_study -> Text,
        academic_year -> Integer,
        advisor_id -> Nullable<Text>,
        created_at -> Text,
    }
}

diesel::table! {
    achievement_references (id) {
        id -> Text,
        student_id -> Text,
        content_ref -> Text,
        status -> Text,
        submitted_at -> Nullable<Text>,
        verified_at -> Nullable<Text>,
        verified_by -> Nullable<Text>,
        rejection_note -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::joinable!(achievement_references -> students (student_id));
diesel::joinable!(students -> lecturers (advisor_id));

diesel::allow_tables_to_appear_in_same_query!(users, lecturers, students, achievement_references);
