mod courses;
mod periods;
